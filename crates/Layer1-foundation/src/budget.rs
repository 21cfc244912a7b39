//! Budget - 세션 전체 턴/비용 한도
//!
//! 최상위 엔진과 모든 서브에이전트가 같은 `Arc<Budget>`을 공유합니다.
//! 모든 갱신은 하나의 lock 안에서 read-modify-write 로 처리됩니다.

use crate::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 소진된 한도 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetKind {
    Turns,
    Cost,
}

impl fmt::Display for BudgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetKind::Turns => write!(f, "turns"),
            BudgetKind::Cost => write!(f, "cost"),
        }
    }
}

/// 한도 설정
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetLimits {
    pub max_turns: Option<u32>,
    pub max_cost: Option<f64>,
    /// 서브에이전트 최대 중첩 깊이 (최상위 = 0)
    pub max_depth: u32,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            max_turns: Some(50),
            max_cost: None,
            max_depth: 2,
        }
    }
}

impl BudgetLimits {
    pub fn unlimited() -> Self {
        Self {
            max_turns: None,
            max_cost: None,
            max_depth: u32::MAX,
        }
    }

    pub fn max_turns(mut self, turns: u32) -> Self {
        self.max_turns = Some(turns);
        self
    }

    pub fn max_cost(mut self, cost: f64) -> Self {
        self.max_cost = Some(cost);
        self
    }

    pub fn max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }
}

/// 현재 사용량
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetUsage {
    pub consumed_turns: u32,
    pub consumed_cost: f64,
    pub exhausted: Option<BudgetKind>,
}

#[derive(Debug, Default)]
struct BudgetState {
    consumed_turns: u32,
    consumed_cost: f64,
    exhausted: Option<BudgetKind>,
}

/// 공유 예산
#[derive(Debug)]
pub struct Budget {
    limits: BudgetLimits,
    state: Mutex<BudgetState>,
}

impl Budget {
    pub fn new(limits: BudgetLimits) -> Self {
        Self {
            limits,
            state: Mutex::new(BudgetState::default()),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(BudgetLimits::unlimited())
    }

    pub fn limits(&self) -> &BudgetLimits {
        &self.limits
    }

    /// 새 턴 시작 (턴 수 한도 검사와 증가를 한 번에)
    ///
    /// 성공 시 이번 턴 번호 (1부터).
    pub fn try_begin_turn(&self) -> std::result::Result<u32, BudgetKind> {
        let mut state = self.state.lock();
        if let Some(kind) = state.exhausted {
            return Err(kind);
        }
        if let Some(max) = self.limits.max_turns {
            if state.consumed_turns >= max {
                state.exhausted = Some(BudgetKind::Turns);
                return Err(BudgetKind::Turns);
            }
        }
        state.consumed_turns += 1;
        Ok(state.consumed_turns)
    }

    /// 비용 기록. 이번 기록으로 처음 한도를 넘으면 `Some(Cost)`.
    pub fn record_cost(&self, cost: f64) -> Option<BudgetKind> {
        let mut state = self.state.lock();
        state.consumed_cost += cost.max(0.0);
        match self.limits.max_cost {
            Some(max) if state.consumed_cost > max => {
                if state.exhausted.is_none() {
                    state.exhausted = Some(BudgetKind::Cost);
                }
                state.exhausted
            }
            _ => None,
        }
    }

    /// 소진 여부
    pub fn exhausted(&self) -> Option<BudgetKind> {
        self.state.lock().exhausted
    }

    /// 새 작업 허용 여부
    pub fn check(&self) -> Result<()> {
        match self.exhausted() {
            Some(kind) => Err(Error::BudgetExceeded(format!("{} budget exhausted", kind))),
            None => Ok(()),
        }
    }

    /// 위임 깊이 검사
    pub fn check_depth(&self, depth: u32) -> Result<()> {
        if depth > self.limits.max_depth {
            return Err(Error::BudgetExceeded(format!(
                "delegation depth {} exceeds maximum {}",
                depth, self.limits.max_depth
            )));
        }
        Ok(())
    }

    pub fn usage(&self) -> BudgetUsage {
        let state = self.state.lock();
        BudgetUsage {
            consumed_turns: state.consumed_turns,
            consumed_cost: state.consumed_cost,
            exhausted: state.exhausted,
        }
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::new(BudgetLimits::default())
    }
}

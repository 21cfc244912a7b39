//! Cancellation handle
//!
//! 엔진은 다음 모델 호출 전, 그리고 새 도구 dispatch 전에 이 핸들을 확인합니다.
//! 이미 실행 중인 도구는 강제로 죽이지 않고 끝나거나 타임아웃될 때까지 둡니다.
//!
//! 서브에이전트는 `task` 호출을 dispatch한 토큰의 자식을 받으므로
//! ([`CancelHandle::child_of`]) 부모를 취소하면 중첩된 엔진도 다음
//! 체크포인트에서 멈춥니다.

use tokio_util::sync::CancellationToken;

/// 복제 가능한 취소 핸들
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 부모가 취소되면 함께 취소되는 핸들 (반대 방향은 전파되지 않음)
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    /// 외부 토큰(dispatch 토큰 등)을 부모로 하는 핸들
    pub fn child_of(token: &CancellationToken) -> Self {
        Self {
            token: token.child_token(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 취소될 때까지 대기
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_follows_parent() {
        let parent = CancelHandle::new();
        let child = parent.child();
        let sibling = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
        assert!(!sibling.is_cancelled());

        parent.cancel();
        assert!(sibling.is_cancelled());
    }

    #[test]
    fn test_child_of_token() {
        let token = CancellationToken::new();
        let handle = CancelHandle::child_of(&token);
        handle.cancel();
        assert!(!token.is_cancelled());

        let handle = CancelHandle::child_of(&token);
        token.cancel();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        tokio::spawn(async move { clone.cancel() });
        handle.cancelled().await;
        assert!(handle.is_cancelled());
    }
}

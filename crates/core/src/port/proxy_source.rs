// Proxy Source Port (Interface)

use crate::error::Result;
use async_trait::async_trait;

/// Supplies the current set of proxy endpoint addresses, either from a
/// static configured list or from a remote IP-issuing API.
#[async_trait]
pub trait ProxySource: Send + Sync {
    async fn fetch_endpoints(&self) -> Result<Vec<String>>;
}

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use tokio::sync::Mutex;

    /// Source returning a scripted sequence of results, one per call.
    pub struct MockProxySource {
        responses: Mutex<Vec<Result<Vec<String>>>>,
    }

    impl MockProxySource {
        pub fn new(mut responses: Vec<Result<Vec<String>>>) -> Self {
            responses.reverse(); // pop() serves them in order
            Self {
                responses: Mutex::new(responses),
            }
        }

        pub fn fixed(addresses: Vec<&str>) -> Self {
            let owned: Vec<String> = addresses.into_iter().map(String::from).collect();
            Self::new(vec![Ok(owned)])
        }
    }

    #[async_trait]
    impl ProxySource for MockProxySource {
        async fn fetch_endpoints(&self) -> Result<Vec<String>> {
            self.responses
                .lock()
                .await
                .pop()
                .unwrap_or_else(|| Err(AppError::Internal("mock source exhausted".into())))
        }
    }
}

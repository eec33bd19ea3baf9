use async_trait::async_trait;

// Input side: where primary and secondary lines come from
#[async_trait]
pub trait LineSourcePort: Send + Sync {
    async fn read_lines(&self, location: &str) -> Result<Vec<String>, String>;
}

// Output side: persists the finished lines and reports where they went
#[async_trait]
pub trait LineSinkPort: Send + Sync {
    async fn write_lines(&self, lines: &[String]) -> Result<String, String>;
}

// Remote skin data
#[async_trait]
pub trait HttpClientPort: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpGetResult, String>;
}

#[derive(Clone, Debug)]
pub struct HttpGetResult {
    pub status: u16,
    pub body: String,
}

impl HttpGetResult {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

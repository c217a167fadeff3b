use async_trait::async_trait;
use tracing::info;

/// Outbound delivery of one-time codes.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send_otp(&self, phone: &str, code: &str) -> Result<(), String>;
}

/// Development gateway that only logs a masked message.
#[derive(Debug, Default, Clone)]
pub struct LogSmsGateway;

#[async_trait]
impl SmsGateway for LogSmsGateway {
    async fn send_otp(&self, phone: &str, code: &str) -> Result<(), String> {
        info!("OTP {} dispatched to {}", mask(code, 1), mask(phone, 4));
        Ok(())
    }
}

/// Keep the last `visible` characters.
pub fn mask(value: &str, visible: usize) -> String {
    let count = value.chars().count();
    let hidden = count.saturating_sub(visible);
    value
        .chars()
        .enumerate()
        .map(|(i, c)| if i < hidden { '*' } else { c })
        .collect()
}

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;

use crate::error::Result;

/// Source of time for every wait the bot performs: retry backoff, the pause
/// between swaps and the countdown between passes.
#[async_trait]
pub trait Scheduler: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep_until(&self, deadline: Instant);

    async fn sleep(&self, duration: Duration) {
        let deadline = self.now() + duration;
        self.sleep_until(deadline).await;
    }
}

pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;
    }
}

/// The person at the terminal.
#[async_trait]
pub trait Operator: Send + Sync {
    async fn read_line(&self, prompt: &str) -> Result<String>;
}

pub struct StdinOperator;

#[async_trait]
impl Operator for StdinOperator {
    async fn read_line(&self, prompt: &str) -> Result<String> {
        {
            let mut out = std::io::stdout().lock();
            write!(out, "\x1b[36m{prompt}\x1b[0m")?;
            out.flush()?;
        }
        let mut line = String::new();
        BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        Ok(line)
    }
}

/// Reads the leading decimal digits of `input`. Anything that does not yield
/// a positive number falls back to a single swap.
pub fn parse_swap_count(input: &str) -> usize {
    let digits: String = input
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    match digits.parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => 1,
    }
}

pub async fn ask_swap_count(operator: &dyn Operator) -> Result<usize> {
    let answer = operator
        .read_line("How many swaps to perform per wallet? ")
        .await?;
    Ok(parse_swap_count(&answer))
}

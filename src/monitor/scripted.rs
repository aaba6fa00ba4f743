//! Scripted volatility readings for replay and tests

use super::VolatilitySource;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Yields a fixed sequence of readings, one per call
#[derive(Clone)]
pub struct ScriptedVolatility {
    readings: Arc<Mutex<VecDeque<Option<f64>>>>,
    script: Arc<Vec<Option<f64>>>,
    cycle: bool,
}

impl ScriptedVolatility {
    /// Source that errors once the script is exhausted
    pub fn new(readings: impl IntoIterator<Item = Option<f64>>) -> Self {
        let script: Vec<Option<f64>> = readings.into_iter().collect();
        Self {
            readings: Arc::new(Mutex::new(script.iter().copied().collect())),
            script: Arc::new(script),
            cycle: false,
        }
    }

    /// Source that restarts the script when exhausted
    pub fn cycling(readings: impl IntoIterator<Item = Option<f64>>) -> Self {
        Self {
            cycle: true,
            ..Self::new(readings)
        }
    }

    /// Queue another reading
    pub async fn push(&self, reading: Option<f64>) {
        self.readings.lock().await.push_back(reading);
    }

    /// Readings not yet consumed
    pub async fn remaining(&self) -> usize {
        self.readings.lock().await.len()
    }
}

#[async_trait]
impl VolatilitySource for ScriptedVolatility {
    async fn current_volatility(&self) -> anyhow::Result<Option<f64>> {
        let mut readings = self.readings.lock().await;
        if readings.is_empty() && self.cycle {
            readings.extend(self.script.iter().copied());
        }
        readings
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("Volatility script exhausted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_readings_in_order() {
        let source = ScriptedVolatility::new([Some(0.08), None, Some(0.32)]);
        assert_eq!(source.current_volatility().await.unwrap(), Some(0.08));
        assert_eq!(source.current_volatility().await.unwrap(), None);
        assert_eq!(source.current_volatility().await.unwrap(), Some(0.32));
        assert!(source.current_volatility().await.is_err());
    }

    #[tokio::test]
    async fn test_cycling_restarts() {
        let source = ScriptedVolatility::cycling([Some(0.1), Some(0.2)]);
        for expected in [0.1, 0.2, 0.1, 0.2] {
            assert_eq!(source.current_volatility().await.unwrap(), Some(expected));
        }
    }

    #[tokio::test]
    async fn test_push_extends_script() {
        let source = ScriptedVolatility::new([]);
        assert!(source.current_volatility().await.is_err());
        source.push(Some(0.25)).await;
        assert_eq!(source.remaining().await, 1);
        assert_eq!(source.current_volatility().await.unwrap(), Some(0.25));
    }

    #[tokio::test]
    async fn test_empty_cycling_script_errors() {
        let source = ScriptedVolatility::cycling([]);
        assert!(source.current_volatility().await.is_err());
    }
}

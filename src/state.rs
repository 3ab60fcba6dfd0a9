//! Process-lifetime state shared between the scheduler and the command layer.
//!
//! Both stores are owned values handed out behind `Arc`; every mutation goes
//! through their methods and the internal lock.

use crate::models::{AlertState, InstrumentAnalysis};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

/// 记录每个交易对最近一次的汇总状态，只在状态变化时报警
#[derive(Default)]
pub struct AlertDeduplicator {
    states: Mutex<HashMap<String, AlertState>>,
}

impl AlertDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true on the first observation of `symbol` and whenever the
    /// (above_all_both, below_all_both) pair differs from the stored one.
    pub async fn should_alert(&self, symbol: &str, analysis: &InstrumentAnalysis) -> bool {
        let next = analysis.summary.alert_state();
        let mut states = self.states.lock().await;

        match states.get(symbol) {
            Some(prev) if *prev == next => false,
            _ => {
                states.insert(symbol.to_string(), next);
                true
            }
        }
    }

    pub async fn last_state(&self, symbol: &str) -> Option<AlertState> {
        self.states.lock().await.get(symbol).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriberStatus {
    pub active: bool,
    pub last_alert: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct Subscribers {
    inner: RwLock<HashMap<String, SubscriberStatus>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_active<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let inner = ids
            .into_iter()
            .map(|id| {
                (
                    id.into(),
                    SubscriberStatus {
                        active: true,
                        last_alert: None,
                    },
                )
            })
            .collect();

        Self {
            inner: RwLock::new(inner),
        }
    }

    /// 切换订阅状态，返回切换后的 active；未知 id 直接订阅
    pub async fn toggle(&self, id: &str) -> bool {
        let mut inner = self.inner.write().await;
        let status = inner.entry(id.to_string()).or_insert(SubscriberStatus {
            active: false,
            last_alert: None,
        });
        status.active = !status.active;
        status.active
    }

    pub async fn status(&self, id: &str) -> Option<SubscriberStatus> {
        self.inner.read().await.get(id).cloned()
    }

    pub async fn active_ids(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut ids: Vec<String> = inner
            .iter()
            .filter(|(_, s)| s.active)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub async fn record_alert(&self, id: &str, at: DateTime<Utc>) {
        if let Some(status) = self.inner.write().await.get_mut(id) {
            status.last_alert = Some(at);
        }
    }
}

//! Stateful mock for the [`RuleStore`] abstraction.
//!
//! Tracks the rule set the way the kernel would: a restore replaces what the
//! next save returns. Tests assert on that state rather than on call order.

#![cfg(test)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{Error, RuleStore};
use crate::dump::RuleDump;

#[derive(Debug, Default)]
pub struct RuleStoreState {
    pub current: Vec<u8>,
    pub saves: usize,
    pub restored: Vec<Vec<u8>>,
    /// Map of operation name -> error message. If set, the operation will fail.
    pub fail_on: HashMap<String, String>,
}

impl RuleStoreState {
    fn check_fail(&self, op: &str) -> Result<(), Error> {
        if let Some(msg) = self.fail_on.get(op) {
            Err(Error::General(msg.clone()))
        } else {
            Ok(())
        }
    }
}

#[derive(Clone)]
pub struct MockRuleStore {
    pub state: Arc<Mutex<RuleStoreState>>,
}

impl MockRuleStore {
    pub fn new(current: &str) -> Self {
        Self::with_state(RuleStoreState {
            current: current.as_bytes().to_vec(),
            ..Default::default()
        })
    }

    pub fn with_state(state: RuleStoreState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn fail_on(self, op: &str, msg: &str) -> Self {
        self.state.lock().unwrap().fail_on.insert(op.into(), msg.into());
        self
    }
}

#[async_trait]
impl RuleStore for MockRuleStore {
    async fn save(&self) -> Result<RuleDump, Error> {
        let mut s = self.state.lock().unwrap();
        s.check_fail("save")?;
        s.saves += 1;
        Ok(RuleDump::from_bytes(s.current.clone())?)
    }

    async fn restore(&self, dump: &RuleDump) -> Result<(), Error> {
        let mut s = self.state.lock().unwrap();
        s.check_fail("restore")?;
        let bytes = dump.to_bytes();
        s.current = bytes.clone();
        s.restored.push(bytes);
        Ok(())
    }
}

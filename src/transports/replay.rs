//! Scripted transport that plays back predefined sessions.
//!
//! Each connect attempt consumes the next [`SessionScript`]. Once the script
//! runs out, every further attempt gets the fallback (a refusal by default),
//! so a test can bound how many sessions the loop sees.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::trace;

use crate::transport::{CloseInfo, Connector, Incoming, Link};
use crate::types::Frame;
use crate::{Endpoint, LinkError, Result};

/// What one connect attempt does
#[derive(Debug, Clone)]
pub enum SessionScript {
    /// Fail the connect with this reason
    Refuse(String),
    /// Never finish connecting
    Stall,
    /// Connect, then play these steps in order
    Accept(Vec<ScriptStep>),
}

/// One step of an accepted session
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Send(Frame),
    /// Sleep on the tokio clock before the next step
    Wait(Duration),
    /// Remote close handshake
    Close(Option<CloseInfo>),
    /// Transport failure with this reason
    Fail(String),
    /// Stay open and silent forever
    Hold,
}

impl ScriptStep {
    pub fn text(text: impl Into<String>) -> Self {
        ScriptStep::Send(Frame::text(text))
    }

    pub fn binary(payload: impl Into<Vec<u8>>) -> Self {
        ScriptStep::Send(Frame::binary(payload.into()))
    }

    pub fn close(code: u16, reason: impl Into<String>) -> Self {
        ScriptStep::Close(Some(CloseInfo::new(code, reason)))
    }

    pub fn wait_ms(ms: u64) -> Self {
        ScriptStep::Wait(Duration::from_millis(ms))
    }
}

/// Counters shared between a [`ReplayConnector`] and the test observing it
#[derive(Debug, Default)]
pub struct ReplayStats {
    attempts: AtomicUsize,
    close_acks: AtomicUsize,
    client_closes: AtomicUsize,
}

impl ReplayStats {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Remote closes the client answered
    pub fn close_acks(&self) -> usize {
        self.close_acks.load(Ordering::SeqCst)
    }

    /// Client-initiated closes
    pub fn client_closes(&self) -> usize {
        self.client_closes.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct ReplayConnector {
    sessions: VecDeque<SessionScript>,
    fallback: SessionScript,
    stats: Arc<ReplayStats>,
}

impl Default for ReplayConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayConnector {
    pub fn new() -> Self {
        Self {
            sessions: VecDeque::new(),
            fallback: SessionScript::Refuse("replay script exhausted".to_string()),
            stats: Arc::new(ReplayStats::default()),
        }
    }

    pub fn refuse(mut self, reason: impl Into<String>) -> Self {
        self.sessions.push_back(SessionScript::Refuse(reason.into()));
        self
    }

    pub fn stall(mut self) -> Self {
        self.sessions.push_back(SessionScript::Stall);
        self
    }

    pub fn session(mut self, steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        self.sessions.push_back(SessionScript::Accept(steps.into_iter().collect()));
        self
    }

    /// Script used for every attempt after the queued ones
    pub fn then_forever(mut self, script: SessionScript) -> Self {
        self.fallback = script;
        self
    }

    pub fn stats(&self) -> Arc<ReplayStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait::async_trait]
impl Connector for ReplayConnector {
    async fn connect(&mut self, endpoint: &Endpoint) -> Result<Box<dyn Link>> {
        let attempt = self.stats.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let script = self.sessions.pop_front().unwrap_or_else(|| self.fallback.clone());
        trace!(attempt, %endpoint, ?script, "Replaying session");

        match script {
            SessionScript::Refuse(reason) => Err(LinkError::connect_failed(reason)),
            SessionScript::Stall => std::future::pending().await,
            SessionScript::Accept(steps) => Ok(Box::new(ReplayLink {
                steps: steps.into(),
                stats: Arc::clone(&self.stats),
                open: true,
            })),
        }
    }
}

struct ReplayLink {
    steps: VecDeque<ScriptStep>,
    stats: Arc<ReplayStats>,
    open: bool,
}

#[async_trait::async_trait]
impl Link for ReplayLink {
    async fn next_message(&mut self) -> Result<Option<Incoming>> {
        loop {
            let Some(step) = self.steps.pop_front() else {
                self.open = false;
                return Ok(None);
            };

            match step {
                ScriptStep::Send(frame) => return Ok(Some(Incoming::Frame(frame))),
                ScriptStep::Wait(delay) => tokio::time::sleep(delay).await,
                ScriptStep::Close(info) => {
                    self.open = false;
                    return Ok(Some(Incoming::Close(info)));
                }
                ScriptStep::Fail(reason) => {
                    self.open = false;
                    return Err(LinkError::transport_failed(reason));
                }
                ScriptStep::Hold => {
                    self.steps.push_front(ScriptStep::Hold);
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    async fn acknowledge_close(&mut self) -> Result<()> {
        self.stats.close_acks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        self.stats.client_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

//! In-memory connections for tests and dry runs.
//!
//! [`ScriptedConnection`] answers statements from substring-matched rules and
//! records every statement it receives; [`ScriptedProvider`] hands out
//! connections sharing one script and one statement log.

use crate::adapters::{ConnectionConfig, ConnectionProvider, MetadataConnection, QueryRow};
use crate::{Result, error::MetaScanError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Reply {
    Rows(Vec<QueryRow>),
    Fail(String),
    Delay(Duration, Vec<QueryRow>),
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    reply: Reply,
}

#[derive(Debug, Default)]
struct Log {
    statements: Mutex<Vec<String>>,
    closed: AtomicUsize,
}

/// Connection replying from pattern rules.
///
/// Rules are checked in insertion order; the first rule whose pattern occurs
/// in the statement wins. Unmatched statements return no rows.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnection {
    rules: Vec<Rule>,
    log: Arc<Log>,
}

impl ScriptedConnection {
    /// Creates a connection with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replies with `rows` to statements containing `pattern`.
    pub fn on(mut self, pattern: impl Into<String>, rows: Vec<QueryRow>) -> Self {
        self.rules.push(Rule {
            pattern: pattern.into(),
            reply: Reply::Rows(rows),
        });
        self
    }

    /// Fails statements containing `pattern` with a query error.
    pub fn fail_on(mut self, pattern: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules.push(Rule {
            pattern: pattern.into(),
            reply: Reply::Fail(message.into()),
        });
        self
    }

    /// Sleeps for `delay` before replying with `rows`.
    pub fn delay_on(
        mut self,
        pattern: impl Into<String>,
        delay: Duration,
        rows: Vec<QueryRow>,
    ) -> Self {
        self.rules.push(Rule {
            pattern: pattern.into(),
            reply: Reply::Delay(delay, rows),
        });
        self
    }

    /// Statements received so far, across all clones.
    pub fn executed(&self) -> Vec<String> {
        self.log
            .statements
            .lock()
            .map(|statements| statements.clone())
            .unwrap_or_default()
    }

    /// Statements containing `pattern`.
    pub fn executed_matching(&self, pattern: &str) -> Vec<String> {
        self.executed()
            .into_iter()
            .filter(|sql| sql.contains(pattern))
            .collect()
    }

    /// Number of closed clones.
    pub fn closed_count(&self) -> usize {
        self.log.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataConnection for ScriptedConnection {
    async fn query(&mut self, sql: &str) -> Result<Vec<QueryRow>> {
        if let Ok(mut statements) = self.log.statements.lock() {
            statements.push(sql.to_string());
        }

        let reply = self
            .rules
            .iter()
            .find(|rule| sql.contains(&rule.pattern))
            .map(|rule| rule.reply.clone());

        match reply {
            Some(Reply::Rows(rows)) => Ok(rows),
            Some(Reply::Fail(message)) => Err(MetaScanError::query_failed(message)),
            Some(Reply::Delay(delay, rows)) => {
                tokio::time::sleep(delay).await;
                Ok(rows)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.log.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Provider opening clones of one scripted connection.
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    script: ScriptedConnection,
    opened: Arc<AtomicUsize>,
    refuse_after: Option<usize>,
}

impl ScriptedProvider {
    /// Creates a provider serving `script`.
    pub fn new(script: ScriptedConnection) -> Self {
        Self {
            script,
            opened: Arc::new(AtomicUsize::new(0)),
            refuse_after: None,
        }
    }

    /// Refuses every open after the first `count` with a connection error.
    pub fn refuse_after(mut self, count: usize) -> Self {
        self.refuse_after = Some(count);
        self
    }

    /// Number of successful opens.
    pub fn opened_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// The shared script, for inspecting the statement log.
    pub fn script(&self) -> &ScriptedConnection {
        &self.script
    }
}

#[async_trait]
impl ConnectionProvider for ScriptedProvider {
    async fn open(&self, _config: &ConnectionConfig) -> Result<Box<dyn MetadataConnection>> {
        let opened = self.opened.load(Ordering::SeqCst);
        if self.refuse_after.is_some_and(|limit| opened >= limit) {
            return Err(MetaScanError::connection_failed(std::io::Error::from(
                std::io::ErrorKind::ConnectionRefused,
            )));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.script.clone()))
    }
}

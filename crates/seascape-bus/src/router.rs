//! # Command Routing
//!
//! Server side of request-reply: a [`CommandRouter`] maps command names to
//! handlers, and a [`ReplyServer`] pumps a reply socket through it.

use crate::error::SocketError;
use crate::ports::ReplySocket;
use async_trait::async_trait;
use seascape_types::{Reply, Request};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handles one or more commands.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, request: Request) -> Reply;
}

/// Command name to handler table.
#[derive(Clone, Default)]
pub struct CommandRouter {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `command`, replacing any previous handler.
    pub fn register(&mut self, command: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        let command = command.into();
        if self.handlers.insert(command.clone(), handler).is_some() {
            debug!(command = %command, "Replaced command handler");
        }
    }

    #[must_use]
    pub fn with(mut self, command: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        self.register(command, handler);
        self
    }

    /// Registered command names, sorted.
    #[must_use]
    pub fn commands(&self) -> Vec<&str> {
        let mut commands: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        commands.sort_unstable();
        commands
    }

    pub async fn dispatch(&self, request: Request) -> Reply {
        match self.handlers.get(&request.command) {
            Some(handler) => handler.handle(request).await,
            None => {
                debug!(command = %request.command, "Unknown command");
                Reply::fail(format!("unknown command '{}'", request.command))
            }
        }
    }
}

/// Serves requests from a reply socket until cancelled.
pub struct ReplyServer {
    router: CommandRouter,
    served: u64,
}

impl ReplyServer {
    #[must_use]
    pub fn new(router: CommandRouter) -> Self {
        Self { router, served: 0 }
    }

    /// Receive, dispatch and reply until `cancel` fires or the socket fails.
    ///
    /// Undecodable requests get a fail reply so the requester is never left
    /// waiting. Returns the number of requests served.
    pub async fn serve(
        mut self,
        mut socket: Box<dyn ReplySocket>,
        cancel: CancellationToken,
    ) -> Result<u64, SocketError> {
        info!(commands = ?self.router.commands(), "Reply server started");
        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                frame = socket.recv() => frame?,
            };

            let reply = match Request::decode(&frame) {
                Ok(request) => {
                    let command = request.command.clone();
                    let reply = self.router.dispatch(request).await;
                    debug!(command = %command, ok = reply.is_ok(), "Request served");
                    reply
                }
                Err(e) => {
                    warn!(error = %e, "Undecodable request");
                    Reply::fail(format!("invalid request: {e}"))
                }
            };

            let bytes = match reply.encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(error = %e, "Reply could not be encoded");
                    Reply::fail(format!("reply could not be encoded: {e}"))
                        .encode()
                        .map_err(|e| SocketError::Io(e.to_string()))?
                }
            };
            socket.send(bytes).await?;
            self.served += 1;
        }
        info!(served = self.served, "Reply server stopped");
        Ok(self.served)
    }
}

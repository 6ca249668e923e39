//! Response orchestrator: turns one admitted inbound event into at most one
//! outbound reply.
//!
//! Per-event pipeline: claim (dedup) -> strip own-mention markup -> built-in
//! commands -> rate check -> store user message -> fire-and-forget memory
//! extraction -> context assembly -> bounded agent loop -> send -> store
//! reply. Each inbound event runs on its own spawned task; nothing here may
//! block the connection's read loop.
//!
//! The agent loop is bounded to exactly one tool round trip: tool requests
//! in the follow-up completion are ignored, never executed. Any loop error
//! triggers one plain no-tools retry of the same user text; if that also
//! fails the user gets a fixed apology instead of an error payload.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info, warn};

use corvid_types::config::{BotConfig, LlmConfig, PersonaConfig};
use corvid_types::event::{EventKind, InboundEvent};
use corvid_types::llm::{ChatMessage, ChatRole, CompletionRequest, LlmError};
use corvid_types::memory::Memory;
use corvid_types::message::MessageRole;
use corvid_types::platform::{ReplyOptions, UserProfile};

use crate::commands::{self, Command};
use crate::conversation::ConversationService;
use crate::dedup::Deduplicator;
use crate::llm::CompletionClient;
use crate::memory::MemoryEngine;
use crate::platform::PlatformClient;
use crate::profile::ProfileCache;
use crate::repository::{ConversationRepository, MemoryRepository, ProcessedEventRepository};
use crate::tools::registry::ToolRegistry;
use crate::tools::ToolOutput;

/// Fixed user-visible reply when the completion path fails entirely.
pub const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble processing your message right now. Please try again in a bit.";

/// Fixed greeting posted after accepting a group invite.
const GROUP_GREETING: &str = "Hi everyone! Thanks for the invite. Mention me any time.";

/// Terminal state of one event's journey through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Another delivery of the same event already won the claim.
    Duplicate,
    /// A kind the pipeline does not reply to (generic notifications).
    Ignored,
    /// Handled by the built-in command surface.
    Command,
    /// Joined a group from an invite.
    GroupJoined,
    /// Blocked by the message-rate window.
    RateLimited,
    /// A reply (possibly the apology fallback) was sent and stored.
    Replied,
    /// The event terminated on an error path (claim or send failure).
    Failed,
}

/// Coordinates the full event-to-reply pipeline.
pub struct ResponseOrchestrator<CR, ER, MR>
where
    CR: ConversationRepository,
    ER: ProcessedEventRepository,
    MR: MemoryRepository + 'static,
{
    conversations: ConversationService<CR>,
    dedup: Deduplicator<ER>,
    memories: Arc<MemoryEngine<MR>>,
    platform: Arc<dyn PlatformClient>,
    completion: Arc<dyn CompletionClient>,
    profiles: ProfileCache,
    registry: ToolRegistry,
    llm: LlmConfig,
    persona: PersonaConfig,
    relevant_limit: usize,
    mention_markup: Regex,
}

impl<CR, ER, MR> ResponseOrchestrator<CR, ER, MR>
where
    CR: ConversationRepository,
    ER: ProcessedEventRepository,
    MR: MemoryRepository + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        conversations: ConversationService<CR>,
        dedup: Deduplicator<ER>,
        memories: Arc<MemoryEngine<MR>>,
        platform: Arc<dyn PlatformClient>,
        completion: Arc<dyn CompletionClient>,
        profiles: ProfileCache,
        registry: ToolRegistry,
        config: &BotConfig,
    ) -> Self {
        // The handle comes from config; escaping keeps the pattern valid for
        // any handle content.
        let mention_markup = Regex::new(&format!(
            r"(?i)@{}\b",
            regex::escape(&config.platform.bot_handle)
        ))
        .unwrap();

        Self {
            conversations,
            dedup,
            memories,
            platform,
            completion,
            profiles,
            registry,
            llm: config.llm.clone(),
            persona: config.persona.clone(),
            relevant_limit: config.memory.relevant_limit,
            mention_markup,
        }
    }

    /// Drive one inbound event to a terminal state.
    pub async fn handle_event(&self, event: InboundEvent) -> EventOutcome {
        match self.dedup.claim(&event).await {
            Ok(true) => {}
            Ok(false) => return EventOutcome::Duplicate,
            Err(err) => {
                // Without a successful claim we cannot guarantee at-most-once;
                // failing the event is the safe side of that trade.
                warn!(event_id = %event.id, error = %err, "dedup claim failed");
                return EventOutcome::Failed;
            }
        }

        match event.kind {
            EventKind::Notification => {
                debug!(event_id = %event.id, "generic notification; nothing to reply");
                return EventOutcome::Ignored;
            }
            EventKind::GroupInvite => return self.handle_group_invite(&event).await,
            _ => {}
        }

        let text = self.strip_own_mentions(&event.text);

        if let Some(command) = commands::parse(&text) {
            return self.handle_command(&event, command).await;
        }

        let is_exempt = self.conversations.is_exempt(&event.author_user_id);
        match self
            .conversations
            .check_and_increment_rate(&event.author_user_id, is_exempt)
            .await
        {
            Ok(decision) if !decision.allowed => {
                let notice = rate_limit_notice(decision.reset_at);
                if let Err(err) = self.send(&event, &notice).await {
                    warn!(event_id = %event.id, error = %err, "rate notice send failed");
                }
                return EventOutcome::RateLimited;
            }
            Ok(_) => {}
            Err(err) => {
                // A broken rate store must not take the bot offline.
                warn!(error = %err, "rate check failed; admitting message");
            }
        }

        if let Err(err) = self
            .conversations
            .append(&event.author_user_id, MessageRole::User, &text)
            .await
        {
            warn!(error = %err, "failed to store user message");
        }

        self.spawn_memory_extraction(&event.author_user_id, &text);

        let reply = match self.build_reply(&event, &text).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(event_id = %event.id, error = %err, "agent loop failed after retry");
                FALLBACK_REPLY.to_string()
            }
        };

        if let Err(err) = self.send(&event, &reply).await {
            // Terminal for this event; no retry at this layer.
            warn!(event_id = %event.id, error = %err, "reply send failed");
            return EventOutcome::Failed;
        }

        if let Err(err) = self
            .conversations
            .append(&event.author_user_id, MessageRole::Assistant, &reply)
            .await
        {
            warn!(error = %err, "failed to store assistant reply");
        }

        info!(event_id = %event.id, kind = %event.kind, "replied");
        EventOutcome::Replied
    }

    // -- command surface ---------------------------------------------------

    async fn handle_command(&self, event: &InboundEvent, command: Command) -> EventOutcome {
        let user_id = &event.author_user_id;
        let reply = match command {
            Command::Help => commands::HELP_TEXT.to_string(),
            Command::ClearContext => match self.conversations.clear(user_id).await {
                Ok(_) => commands::CONTEXT_CLEARED.to_string(),
                Err(err) => {
                    warn!(error = %err, "context clear failed");
                    FALLBACK_REPLY.to_string()
                }
            },
            Command::ShowMemory => match self.memories.list(user_id).await {
                Ok(memories) => commands::format_memories(&memories),
                Err(err) => {
                    warn!(error = %err, "memory listing failed");
                    FALLBACK_REPLY.to_string()
                }
            },
            Command::ClearMemory => match self.memories.forget_all(user_id).await {
                Ok(_) => commands::MEMORY_CLEARED.to_string(),
                Err(err) => {
                    warn!(error = %err, "memory clear failed");
                    FALLBACK_REPLY.to_string()
                }
            },
            Command::Remember(text) if text.is_empty() => commands::REMEMBER_EMPTY.to_string(),
            Command::Remember(text) => match self.memories.remember(user_id, &text).await {
                Ok(()) => commands::REMEMBER_ACK.to_string(),
                Err(err) => {
                    warn!(error = %err, "manual remember failed");
                    FALLBACK_REPLY.to_string()
                }
            },
            Command::LeaveGroup => {
                let Some(group_id) = event.channel_id.as_deref() else {
                    let _ = self.send(event, commands::NOT_A_GROUP).await;
                    return EventOutcome::Command;
                };
                // Say goodbye while we can still post into the group.
                let _ = self.send(event, commands::LEAVING_GROUP).await;
                if let Err(err) = self.platform.leave_group(group_id).await {
                    warn!(group_id, error = %err, "leave group failed");
                }
                return EventOutcome::Command;
            }
        };

        match self.send(event, &reply).await {
            Ok(()) => EventOutcome::Command,
            Err(err) => {
                warn!(event_id = %event.id, error = %err, "command reply send failed");
                EventOutcome::Failed
            }
        }
    }

    async fn handle_group_invite(&self, event: &InboundEvent) -> EventOutcome {
        let Some(group_id) = event.channel_id.as_deref() else {
            debug!(event_id = %event.id, "group invite without group id");
            return EventOutcome::Ignored;
        };

        if let Err(err) = self.platform.join_group(group_id).await {
            warn!(group_id, error = %err, "group join failed");
            return EventOutcome::Failed;
        }

        let opts = ReplyOptions {
            reply_to: None,
            channel_id: Some(group_id.to_string()),
        };
        if let Err(err) = self.platform.send_reply(GROUP_GREETING, &opts).await {
            warn!(group_id, error = %err, "group greeting send failed");
        }
        EventOutcome::GroupJoined
    }

    // -- agent loop --------------------------------------------------------

    /// Assemble context and run the bounded agent loop.
    async fn build_reply(&self, event: &InboundEvent, text: &str) -> Result<String, LlmError> {
        let user_id = &event.author_user_id;

        let profile = self.profiles.get(user_id).await;
        let memories = self
            .memories
            .relevant(user_id, text, self.relevant_limit)
            .await
            .unwrap_or_else(|err| {
                warn!(error = %err, "memory retrieval failed; continuing without");
                Vec::new()
            });
        let system = build_system_prompt(&self.persona.system_prompt, profile.as_ref(), &memories);

        let mut messages: Vec<ChatMessage> = match self.conversations.history(user_id).await {
            Ok(history) => history
                .into_iter()
                .map(|m| ChatMessage {
                    role: match m.role {
                        MessageRole::User => ChatRole::User,
                        MessageRole::Assistant => ChatRole::Assistant,
                    },
                    content: m.content,
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                })
                .collect(),
            Err(err) => {
                warn!(error = %err, "history load failed; replying without context");
                Vec::new()
            }
        };
        if messages.last().map(|m| m.role) != Some(ChatRole::User) {
            messages.push(ChatMessage::user(text));
        }

        match self.tool_round(&messages, &system).await {
            Ok(reply) => Ok(reply),
            Err(err) => {
                // One plain retry of the same user text, no tools.
                warn!(error = %err, "tool round failed; retrying as plain completion");
                let request = CompletionRequest {
                    messages: messages.clone(),
                    system: Some(system),
                    tools: Vec::new(),
                    max_tokens: self.llm.max_tokens,
                    temperature: Some(self.llm.temperature),
                };
                let response = self.complete_with_timeout(&request).await?;
                Ok(response.content)
            }
        }
    }

    /// Exactly one tool-augmented round trip.
    async fn tool_round(
        &self,
        messages: &[ChatMessage],
        system: &str,
    ) -> Result<String, LlmError> {
        let request = CompletionRequest {
            messages: messages.to_vec(),
            system: Some(system.to_string()),
            tools: self.registry.specs(),
            max_tokens: self.llm.max_tokens,
            temperature: Some(self.llm.temperature),
        };
        let first = self.complete_with_timeout(&request).await?;

        if !first.wants_tools() {
            return Ok(first.content);
        }

        let mut followup = messages.to_vec();
        followup.push(ChatMessage::assistant_tool_calls(
            first.content.clone(),
            first.tool_calls.clone(),
        ));

        // Every requested call gets a result-or-error; a failing tool never
        // aborts its siblings.
        for call in &first.tool_calls {
            let output = match tokio::time::timeout(
                Duration::from_secs(self.llm.tool_timeout_secs),
                self.registry.execute(&call.tool_name, &call.arguments),
            )
            .await
            {
                Ok(output) => output,
                Err(_) => ToolOutput::error(format!("tool '{}' timed out", call.tool_name)),
            };
            if !output.success {
                debug!(tool = %call.tool_name, error = ?output.error, "tool reported failure");
            }
            followup.push(ChatMessage::tool_result(&call.call_id, output.to_json()));
        }

        let final_request = CompletionRequest {
            messages: followup,
            system: Some(system.to_string()),
            tools: self.registry.specs(),
            max_tokens: self.llm.max_tokens,
            temperature: Some(self.llm.temperature),
        };
        let second = self.complete_with_timeout(&final_request).await?;

        if second.wants_tools() {
            // Bounded loop: a second batch is never executed.
            debug!(
                requested = second.tool_calls.len(),
                "ignoring tool requests in final completion"
            );
        }
        Ok(second.content)
    }

    async fn complete_with_timeout(
        &self,
        request: &CompletionRequest,
    ) -> Result<corvid_types::llm::CompletionResponse, LlmError> {
        tokio::time::timeout(
            Duration::from_secs(self.llm.timeout_secs),
            self.completion.complete(request),
        )
        .await
        .map_err(|_| LlmError::Timeout)?
    }

    // -- helpers -----------------------------------------------------------

    fn spawn_memory_extraction(&self, user_id: &str, text: &str) {
        let memories = Arc::clone(&self.memories);
        let user_id = user_id.to_string();
        let text = text.to_string();
        tokio::spawn(async move {
            if let Err(err) = memories.extract_and_store(&user_id, &text).await {
                warn!(user_id, error = %err, "memory extraction failed");
            }
        });
    }

    /// Remove the platform's own-mention markup for the bot's handle.
    fn strip_own_mentions(&self, text: &str) -> String {
        let stripped = self.mention_markup.replace_all(text, "");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    async fn send(&self, event: &InboundEvent, text: &str) -> Result<(), corvid_types::error::PlatformError> {
        if event.is_direct() {
            self.platform
                .send_direct_message(text, &event.author_user_id)
                .await?;
        } else {
            let opts = ReplyOptions {
                reply_to: Some(event.id.clone()),
                channel_id: event.channel_id.clone(),
            };
            self.platform.send_reply(text, &opts).await?;
        }
        Ok(())
    }
}

/// Render the system prompt from persona, profile snapshot, and memories.
fn build_system_prompt(
    persona: &str,
    profile: Option<&UserProfile>,
    memories: &[Memory],
) -> String {
    let mut prompt = persona.to_string();

    if let Some(profile) = profile {
        prompt.push_str("\n\n## About this user\n");
        prompt.push_str(&format!("- username: @{}\n", profile.username));
        if let Some(name) = &profile.display_name {
            prompt.push_str(&format!("- display name: {name}\n"));
        }
        if let Some(bio) = &profile.bio {
            prompt.push_str(&format!("- bio: {bio}\n"));
        }
        prompt.push_str(&format!(
            "- followers: {}, following: {}\n",
            profile.followers_count, profile.following_count
        ));
    }

    if !memories.is_empty() {
        prompt.push_str("\n## Things you remember about them\n");
        for memory in memories {
            prompt.push_str(&format!("- [{}] {}\n", memory.kind, memory.value));
        }
    }

    prompt
}

/// Render the fixed rate-limit notice.
fn rate_limit_notice(reset_at: Option<chrono::DateTime<chrono::Utc>>) -> String {
    match reset_at {
        Some(at) => format!(
            "You've reached my message limit for now. Try again after {}.",
            at.format("%H:%M UTC")
        ),
        None => "You've reached my message limit for now. Try again later.".to_string(),
    }
}

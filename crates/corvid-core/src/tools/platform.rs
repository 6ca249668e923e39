//! Built-in platform tools: the side-effecting actions the completion
//! service may request (follow/block/DM/search/group management).
//!
//! Every tool that accepts a user reference takes either a direct platform
//! id or an `@handle`; handles resolve through a best-effort user search
//! before the action runs. Failed resolution is a "user not found" error
//! result, never a panic.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use corvid_types::platform::SearchFilters;

use crate::platform::PlatformClient;

use super::{Tool, ToolOutput};

/// Resolve a user reference to a platform id.
///
/// References starting with '@' are treated as handles and resolved via
/// search (exact username match preferred, otherwise the first hit);
/// anything else is assumed to already be an id.
async fn resolve_user(client: &dyn PlatformClient, reference: &str) -> Result<String, String> {
    let Some(handle) = reference.strip_prefix('@') else {
        return Ok(reference.to_string());
    };

    let matches = client
        .search_users(handle)
        .await
        .map_err(|err| format!("user lookup failed: {err}"))?;

    matches
        .iter()
        .find(|u| u.username.eq_ignore_ascii_case(handle))
        .or_else(|| matches.first())
        .map(|u| u.id.clone())
        .ok_or_else(|| format!("user not found: '{reference}'"))
}

fn user_param_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "user": {
                "type": "string",
                "description": description
            }
        },
        "required": ["user"]
    })
}

/// Which relationship action a [`UserActionTool`] performs.
#[derive(Debug, Clone, Copy)]
pub enum UserAction {
    Follow,
    Unfollow,
    Block,
    Unblock,
}

impl UserAction {
    fn name(self) -> &'static str {
        match self {
            UserAction::Follow => "follow_user",
            UserAction::Unfollow => "unfollow_user",
            UserAction::Block => "block_user",
            UserAction::Unblock => "unblock_user",
        }
    }

    fn description(self) -> &'static str {
        match self {
            UserAction::Follow => "Follow a user on the platform",
            UserAction::Unfollow => "Unfollow a user on the platform",
            UserAction::Block => "Block a user on the platform",
            UserAction::Unblock => "Unblock a user on the platform",
        }
    }
}

/// Follow/unfollow/block/unblock, sharing the user-resolution path.
pub struct UserActionTool {
    platform: Arc<dyn PlatformClient>,
    action: UserAction,
}

impl UserActionTool {
    pub fn new(platform: Arc<dyn PlatformClient>, action: UserAction) -> Self {
        Self { platform, action }
    }
}

#[async_trait]
impl Tool for UserActionTool {
    fn name(&self) -> &str {
        self.action.name()
    }

    fn description(&self) -> &str {
        self.action.description()
    }

    fn parameters_schema(&self) -> Value {
        user_param_schema("Platform user id or @handle")
    }

    async fn execute(&self, args: Value) -> ToolOutput {
        let reference = args["user"].as_str().unwrap_or_default();
        let user_id = match resolve_user(self.platform.as_ref(), reference).await {
            Ok(id) => id,
            Err(message) => return ToolOutput::error(message),
        };

        let result = match self.action {
            UserAction::Follow => self.platform.follow_user(&user_id).await,
            UserAction::Unfollow => self.platform.unfollow_user(&user_id).await,
            UserAction::Block => self.platform.block_user(&user_id).await,
            UserAction::Unblock => self.platform.unblock_user(&user_id).await,
        };

        match result {
            Ok(()) => ToolOutput::success(json!({ "user_id": user_id, "action": self.name() })),
            Err(err) => ToolOutput::error(format!("{} failed: {err}", self.name())),
        }
    }
}

/// Send a direct message to a user.
pub struct SendDirectMessageTool {
    platform: Arc<dyn PlatformClient>,
}

impl SendDirectMessageTool {
    pub fn new(platform: Arc<dyn PlatformClient>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl Tool for SendDirectMessageTool {
    fn name(&self) -> &str {
        "send_direct_message"
    }

    fn description(&self) -> &str {
        "Send a private direct message to a user"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "user": { "type": "string", "description": "Platform user id or @handle" },
                "text": { "type": "string", "description": "Message text to send" }
            },
            "required": ["user", "text"]
        })
    }

    async fn execute(&self, args: Value) -> ToolOutput {
        let reference = args["user"].as_str().unwrap_or_default();
        let text = args["text"].as_str().unwrap_or_default();

        let user_id = match resolve_user(self.platform.as_ref(), reference).await {
            Ok(id) => id,
            Err(message) => return ToolOutput::error(message),
        };

        match self.platform.send_direct_message(text, &user_id).await {
            Ok(sent) => ToolOutput::success(json!({ "message_id": sent.id, "user_id": user_id })),
            Err(err) => ToolOutput::error(format!("send_direct_message failed: {err}")),
        }
    }
}

/// Search public posts.
pub struct SearchPostsTool {
    platform: Arc<dyn PlatformClient>,
}

impl SearchPostsTool {
    pub fn new(platform: Arc<dyn PlatformClient>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl Tool for SearchPostsTool {
    fn name(&self) -> &str {
        "search_posts"
    }

    fn description(&self) -> &str {
        "Search recent public posts on the platform"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "limit": { "type": "integer", "description": "Maximum results (default 5)" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> ToolOutput {
        let query = args["query"].as_str().unwrap_or_default();
        let filters = SearchFilters {
            from_user_id: None,
            limit: args["limit"].as_u64().map(|n| n as u32).or(Some(5)),
        };

        match self.platform.search_posts(query, &filters).await {
            Ok(posts) => {
                let results: Vec<Value> = posts
                    .iter()
                    .map(|p| {
                        json!({
                            "id": p.id,
                            "author": p.author_username.as_deref().unwrap_or(&p.author_user_id),
                            "text": p.text,
                        })
                    })
                    .collect();
                ToolOutput::success(json!({ "posts": results }))
            }
            Err(err) => ToolOutput::error(format!("search_posts failed: {err}")),
        }
    }
}

/// Leave a group conversation.
pub struct LeaveGroupTool {
    platform: Arc<dyn PlatformClient>,
}

impl LeaveGroupTool {
    pub fn new(platform: Arc<dyn PlatformClient>) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl Tool for LeaveGroupTool {
    fn name(&self) -> &str {
        "leave_group"
    }

    fn description(&self) -> &str {
        "Leave a group conversation by its id"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "group_id": { "type": "string", "description": "Group id to leave" }
            },
            "required": ["group_id"]
        })
    }

    async fn execute(&self, args: Value) -> ToolOutput {
        let group_id = args["group_id"].as_str().unwrap_or_default();
        match self.platform.leave_group(group_id).await {
            Ok(()) => ToolOutput::success(json!({ "left": group_id })),
            Err(err) => ToolOutput::error(format!("leave_group failed: {err}")),
        }
    }
}

/// The full built-in tool catalog wired to one platform client.
pub fn builtin_tools(platform: Arc<dyn PlatformClient>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(UserActionTool::new(platform.clone(), UserAction::Follow)),
        Arc::new(UserActionTool::new(platform.clone(), UserAction::Unfollow)),
        Arc::new(UserActionTool::new(platform.clone(), UserAction::Block)),
        Arc::new(UserActionTool::new(platform.clone(), UserAction::Unblock)),
        Arc::new(SendDirectMessageTool::new(platform.clone())),
        Arc::new(SearchPostsTool::new(platform.clone())),
        Arc::new(LeaveGroupTool::new(platform)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPlatform;
    use crate::tools::registry::ToolRegistry;

    fn registry_with(platform: Arc<MockPlatform>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for tool in builtin_tools(platform) {
            registry.register(tool);
        }
        registry
    }

    #[tokio::test]
    async fn catalog_contains_all_builtin_tools() {
        let registry = registry_with(Arc::new(MockPlatform::default()));
        let names: Vec<String> = registry.specs().iter().map(|s| s.name.clone()).collect();
        assert_eq!(
            names,
            vec![
                "follow_user",
                "unfollow_user",
                "block_user",
                "unblock_user",
                "send_direct_message",
                "search_posts",
                "leave_group"
            ]
        );
    }

    #[tokio::test]
    async fn follow_by_direct_id() {
        let platform = Arc::new(MockPlatform::default());
        let registry = registry_with(platform.clone());

        let output = registry.execute("follow_user", r#"{"user":"u-77"}"#).await;
        assert!(output.success);
        assert_eq!(platform.followed.lock().unwrap().as_slice(), ["u-77"]);
    }

    #[tokio::test]
    async fn follow_by_handle_resolves_via_search() {
        let platform =
            Arc::new(MockPlatform::default().with_user(MockPlatform::profile("u-9", "alex")));
        let registry = registry_with(platform.clone());

        let output = registry.execute("follow_user", r#"{"user":"@alex"}"#).await;
        assert!(output.success);
        assert_eq!(platform.followed.lock().unwrap().as_slice(), ["u-9"]);
    }

    #[tokio::test]
    async fn unresolvable_handle_reports_user_not_found() {
        let platform = Arc::new(MockPlatform::default());
        let registry = registry_with(platform.clone());

        let output = registry.execute("block_user", r#"{"user":"@ghost"}"#).await;
        assert!(!output.success);
        assert!(output.error.unwrap().contains("user not found: '@ghost'"));
        assert!(platform.blocked.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_dm_requires_both_parameters() {
        let registry = registry_with(Arc::new(MockPlatform::default()));
        let output = registry
            .execute("send_direct_message", r#"{"user":"u-1"}"#)
            .await;
        assert!(!output.success);
        assert!(output.error.unwrap().contains("missing required parameter 'text'"));
    }

    #[tokio::test]
    async fn send_dm_happy_path() {
        let platform = Arc::new(MockPlatform::default());
        let registry = registry_with(platform.clone());

        let output = registry
            .execute("send_direct_message", r#"{"user":"u-1","text":"hello"}"#)
            .await;
        assert!(output.success);
        assert_eq!(
            platform.direct_messages.lock().unwrap().as_slice(),
            [("hello".to_string(), "u-1".to_string())]
        );
    }

    #[tokio::test]
    async fn leave_group_invokes_platform() {
        let platform = Arc::new(MockPlatform::default());
        let registry = registry_with(platform.clone());

        let output = registry.execute("leave_group", r#"{"group_id":"g-3"}"#).await;
        assert!(output.success);
        assert_eq!(platform.left_groups.lock().unwrap().as_slice(), ["g-3"]);
    }

    #[tokio::test]
    async fn search_posts_returns_structured_results() {
        let registry = registry_with(Arc::new(MockPlatform::default()));
        let output = registry.execute("search_posts", r#"{"query":"rust"}"#).await;
        assert!(output.success);
        assert!(output.result["posts"].is_array());
    }
}

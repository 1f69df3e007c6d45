//! Slack implementation of the chat transport.
//!
//! Channels are chats, message timestamps are message ids, and thread replies
//! carry the reply reference.  A control grid is rendered as Block Kit
//! `actions` blocks below a `section` holding the message text.  Each button's
//! action id records its grid coordinate, so the grid can be rebuilt from the
//! blocks of a message that is read back.

use std::{collections::BTreeMap, ops::Deref, sync::Arc};

use async_trait::async_trait;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use slack_morphism::prelude::*;
use tracing::{info, instrument, warn};

use crate::{
    base::{
        config::Config,
        grid::{Cell, ControlGrid},
        types::{Res, Void},
    },
    interaction::{
        chat_event::{self, ChatEvent},
        dialog,
        registration::RegistrationWorkflow,
    },
};

use super::{ChatClient, ChatMessage, GenericChatClient, MessageRef, OutgoingMessage};

// Type aliases.

type FullClient = slack_morphism::SlackClient<SlackClientHyperConnector<HttpsConnector<HttpConnector>>>;

// Slack limits.

/// Buttons allowed in a single `actions` block.
const MAX_ELEMENTS_PER_BLOCK: usize = 25;

/// Characters allowed in the text of a `section` block.
const MAX_SECTION_CHARS: usize = 3000;

/// Characters allowed in a button label.
const MAX_BUTTON_LABEL_CHARS: usize = 75;

/// Blocks allowed in a single message.
const MAX_BLOCKS: usize = 50;

/// Prefix of the action id of every grid button.
const CELL_ACTION_PREFIX: &str = "cell-";

// Extra methods on `ChatClient` applied by the slack implementation.

impl ChatClient {
    /// Creates a new Slack chat client.
    pub async fn slack(config: &Config) -> Res<Self> {
        let client = SlackChatClient::new(config).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

impl From<SlackChatClient> for ChatClient {
    fn from(client: SlackChatClient) -> Self {
        Self { inner: Arc::new(client) }
    }
}

// Structs.

/// User state for the slack socket client.
struct SlackUserState {
    workflow: RegistrationWorkflow,
    bot_user_id: String,
}

/// Slack client implementation.
#[derive(Clone)]
struct SlackChatClient {
    pub app_token: SlackApiToken,
    pub bot_token: SlackApiToken,
    pub bot_user_id: String,
    pub client: Arc<FullClient>,
}

impl Deref for SlackChatClient {
    type Target = FullClient;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl SlackChatClient {
    /// Create a new Slack chat client.
    #[instrument(name = "SlackChatClient::new", skip_all)]
    pub async fn new(config: &Config) -> Res<Self> {
        // Initialize tokens.

        let app_token = SlackApiToken::new(SlackApiTokenValue(config.slack_app_token.clone()));
        let bot_token = SlackApiToken::new(SlackApiTokenValue(config.slack_bot_token.clone()));

        // Initialize the Slack client.

        let https_connector = HttpsConnector::<HttpConnector>::builder().with_native_roots()?.https_only().enable_all_versions().build();
        let connector = SlackClientHyperConnector::with_connector(https_connector);
        let client = Arc::new(slack_morphism::SlackClient::new(connector));

        // Get the bot's user ID.

        let session = client.open_session(&bot_token);
        let bot_user = session.auth_test().await?;
        let bot_user_id = bot_user.user_id.0;

        info!("Slack bot user ID: {}", bot_user_id);

        Ok(Self {
            app_token,
            bot_token,
            bot_user_id,
            client,
        })
    }
}

#[async_trait]
impl GenericChatClient for SlackChatClient {
    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    async fn start(&self, workflow: RegistrationWorkflow) -> Void {
        // Initialize the socket mode listener.

        let socket_mode_callbacks = SlackSocketModeListenerCallbacks::new()
            .with_command_events(handle_command_event)
            .with_interaction_events(handle_interaction_event)
            .with_push_events(handle_push_event);

        // Initialize the socket mode listener environment.

        let listener_environment = Arc::new(SlackClientEventsListenerEnvironment::new(self.client.clone()).with_user_state(SlackUserState {
            workflow,
            bot_user_id: self.bot_user_id.clone(),
        }));

        let socket_mode_listener = Arc::new(SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            listener_environment.clone(),
            socket_mode_callbacks,
        ));

        // Register an app token to listen for events,
        socket_mode_listener.listen_for(&self.app_token).await?;

        // Start WS connections calling Slack API to get WS url for the token,
        // and wait for Ctrl-C to shutdown.
        socket_mode_listener.serve().await;

        Ok(())
    }

    #[instrument(skip_all, fields(channel_id = %message.chat_id))]
    async fn send_message(&self, message: &OutgoingMessage) -> Res<MessageRef> {
        let content = render_content(&message.text, &message.grid);

        let request = SlackApiChatPostMessageRequest::new(SlackChannelId(message.chat_id.clone()), content).opt_thread_ts(message.reply_to.clone().map(SlackTs));

        let session = self.client.open_session(&self.bot_token);

        let response = session.chat_post_message(&request).await.map_err(|e| anyhow::anyhow!("Failed to send message: {}", e))?;

        Ok(MessageRef::new(response.channel.0, response.ts.0))
    }

    #[instrument(skip_all, fields(channel_id = %message.reference.chat_id, ts = %message.reference.message_id))]
    async fn edit_message(&self, message: &ChatMessage) -> Void {
        let content = render_content(&message.text, &message.grid);

        let request = SlackApiChatUpdateRequest::new(SlackChannelId(message.reference.chat_id.clone()), content, SlackTs(message.reference.message_id.clone()));

        let session = self.client.open_session(&self.bot_token);

        let _ = session.chat_update(&request).await.map_err(|e| anyhow::anyhow!("Failed to edit message: {}", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_message(&self, reference: &MessageRef) -> Void {
        let request = SlackApiChatDeleteRequest::new(SlackChannelId(reference.chat_id.clone()), SlackTs(reference.message_id.clone()));

        let session = self.client.open_session(&self.bot_token);

        let _ = session.chat_delete(&request).await.map_err(|e| anyhow::anyhow!("Failed to delete message: {}", e))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_message(&self, reference: &MessageRef) -> Res<Option<ChatMessage>> {
        let request = SlackApiConversationsHistoryRequest::new()
            .with_channel(SlackChannelId(reference.chat_id.clone()))
            .with_latest(SlackTs(reference.message_id.clone()))
            .with_inclusive(true)
            .with_limit(1);

        let session = self.client.open_session(&self.bot_token);

        let response = session.conversations_history(&request).await.map_err(|e| anyhow::anyhow!("Failed to read message: {}", e))?;

        let message = response.messages.into_iter().find(|m| m.origin.ts.0 == reference.message_id).map(|m| ChatMessage {
            reference: reference.clone(),
            text: unescape(m.content.text.as_deref().unwrap_or_default()),
            grid: grid_from_blocks(m.content.blocks.as_deref().unwrap_or_default()),
        });

        Ok(message)
    }
}

// Rendering.

/// Renders text and controls as Block Kit content.
///
/// The text is split across as many `section` blocks as it needs.  The plain
/// `text` is kept whole alongside the blocks, and it is what gets read back.
fn render_content(text: &str, grid: &ControlGrid) -> SlackMessageContent {
    let mut blocks: Vec<SlackBlock> = split_section_text(text)
        .into_iter()
        .map(|chunk| SlackBlock::Section(SlackSectionBlock::new().with_text(SlackBlockText::MarkDown(SlackBlockMarkDownText::new(chunk)))))
        .collect();

    let mut elements: Vec<SlackActionBlockElement> = Vec::new();

    for (r, row) in grid.rows.iter().enumerate() {
        if !elements.is_empty() && elements.len() + row.len() > MAX_ELEMENTS_PER_BLOCK {
            blocks.push(SlackBlock::Actions(SlackActionsBlock::new(std::mem::take(&mut elements))));
        }

        for (c, cell) in row.iter().enumerate() {
            let button = SlackBlockButtonElement::new(SlackBlockPlainTextOnly::from(truncate_label(&cell.label)))
                .with_action_id(SlackActionId(format!("{CELL_ACTION_PREFIX}{r}-{c}")))
                .with_value(cell.payload.clone());

            elements.push(SlackActionBlockElement::Button(button));
        }
    }

    if !elements.is_empty() {
        blocks.push(SlackBlock::Actions(SlackActionsBlock::new(elements)));
    }

    if blocks.len() > MAX_BLOCKS {
        warn!("Message needs {} blocks, Slack accepts at most {}.", blocks.len(), MAX_BLOCKS);
    }

    SlackMessageContent::new().with_text(text.to_string()).with_blocks(blocks)
}

/// Splits text into chunks that fit a `section` block, breaking at line
/// boundaries.  A single line longer than a section is broken mid-line.
fn split_section_text(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for piece in text.split('\n').flat_map(split_long_line) {
        let piece_len = piece.chars().count();

        if !current.is_empty() && current_len + 1 + piece_len > MAX_SECTION_CHARS {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push('\n');
            current_len += 1;
        }

        current.push_str(&piece);
        current_len += piece_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn split_long_line(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();

    if chars.is_empty() {
        return vec![String::new()];
    }

    chars.chunks(MAX_SECTION_CHARS).map(|c| c.iter().collect()).collect()
}

/// Shortens a label to what a button can show.
fn truncate_label(label: &str) -> String {
    if label.chars().count() <= MAX_BUTTON_LABEL_CHARS {
        return label.to_string();
    }

    let mut truncated: String = label.chars().take(MAX_BUTTON_LABEL_CHARS - 1).collect();
    truncated.push('…');

    truncated
}

/// The text a button shows.
fn button_label(text: &SlackBlockPlainTextOnly) -> String {
    match SlackBlockText::from(text.clone()) {
        SlackBlockText::Plain(plain) => plain.text,
        SlackBlockText::MarkDown(markdown) => markdown.text,
    }
}

/// Rebuilds the control grid from the blocks of a message.
///
/// Buttons that do not carry a grid coordinate in their action id are skipped.
fn grid_from_blocks(blocks: &[SlackBlock]) -> ControlGrid {
    let mut cells = BTreeMap::new();

    for block in blocks {
        let SlackBlock::Actions(actions) = block else {
            continue;
        };

        for element in &actions.elements {
            let SlackActionBlockElement::Button(button) = element else {
                continue;
            };

            let Some(coordinate) = button.action_id.as_ref().and_then(|id| parse_cell_action_id(&id.0)) else {
                continue;
            };

            cells.insert(coordinate, Cell::new(button_label(&button.text), button.value.clone().unwrap_or_default()));
        }
    }

    let mut rows: Vec<Vec<Cell>> = Vec::new();

    for ((r, _), cell) in cells {
        if rows.len() <= r {
            rows.resize_with(r + 1, Vec::new);
        }

        rows[r].push(cell);
    }

    rows.retain(|r| !r.is_empty());

    ControlGrid::new(rows)
}

fn parse_cell_action_id(action_id: &str) -> Option<(usize, usize)> {
    let (r, c) = action_id.strip_prefix(CELL_ACTION_PREFIX)?.split_once('-')?;

    Some((r.parse().ok()?, c.parse().ok()?))
}

/// Undoes the HTML escaping Slack applies to message text.
fn unescape(text: &str) -> String {
    text.replace("&lt;", "<").replace("&gt;", ">").replace("&amp;", "&")
}

// Socket mode listener callbacks for Slack.

/// Handles command events from Slack.
#[instrument(skip_all)]
async fn handle_command_event(
    event: SlackCommandEvent,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> Result<SlackCommandEventResponse, Box<dyn std::error::Error + Send + Sync>> {
    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;

    info!("Received command `{}` ...", event.command.0);

    let text = match event.command.0.as_str() {
        "/template" => dialog::template_text(),
        "/create" => {
            chat_event::handle_chat_event(
                ChatEvent::OpenDraft {
                    chat_id: event.channel_id.0.clone(),
                },
                user_state.workflow.clone(),
            );

            "Creating an event draft ...".to_string()
        }
        other => {
            warn!("Received unsupported command `{}`.", other);
            "Supported commands are `/template` and `/create`.".to_string()
        }
    };

    Ok(SlackCommandEventResponse::new(SlackMessageContent::new().with_text(text)))
}

/// Handles interaction events from Slack.
#[instrument(skip_all)]
async fn handle_interaction_event(event: SlackInteractionEvent, _client: Arc<SlackHyperClient>, states: SlackClientEventsUserState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;

    let SlackInteractionEvent::BlockActions(event) = event else {
        warn!("Received unhandled interaction event.");
        return Ok(());
    };

    let chat_id = event.channel.as_ref().ok_or(anyhow::anyhow!("Failed to get channel ID"))?.id.0.clone();
    let message_id = event.message.as_ref().ok_or(anyhow::anyhow!("Failed to get message"))?.origin.ts.0.clone();

    for action in event.actions.unwrap_or_default() {
        let Some(payload) = action.value else {
            warn!("Skipping action `{}` without a value.", action.action_id.0);
            continue;
        };

        info!("Received control press ...");

        chat_event::handle_chat_event(
            ChatEvent::Control {
                payload,
                message: MessageRef::new(chat_id.clone(), message_id.clone()),
            },
            user_state.workflow.clone(),
        );
    }

    Ok(())
}

/// Handles push events from Slack.
#[instrument(skip_all)]
async fn handle_push_event(event_callback: SlackPushEventCallback, _client: Arc<SlackHyperClient>, states: SlackClientEventsUserState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let event = event_callback.event;
    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;

    match event {
        SlackEventCallbackBody::Message(slack_message_event) => {
            // Drafts and rosters are posted by the bot itself, and must never be read back as input.
            let is_own = slack_message_event.sender.bot_id.is_some() || slack_message_event.sender.user.as_ref().is_some_and(|u| u.0 == user_state.bot_user_id);
            if is_own {
                return Ok(());
            }

            let Some(text) = slack_message_event.content.as_ref().and_then(|c| c.text.as_deref()) else {
                warn!("Skipping message event without text.");
                return Ok(());
            };

            info!("Received message event ...");

            let chat_id = slack_message_event.origin.channel.as_ref().ok_or(anyhow::anyhow!("Failed to get channel ID"))?.0.to_owned();

            chat_event::handle_chat_event(
                ChatEvent::Message {
                    chat_id,
                    message_id: slack_message_event.origin.ts.0.clone(),
                    thread_id: slack_message_event.origin.thread_ts.as_ref().map(|t| t.0.clone()),
                    text: unescape(text),
                },
                user_state.workflow.clone(),
            );
        }
        _ => {
            warn!("Received unhandled push event.")
        }
    }

    Ok(())
}

// Tests.

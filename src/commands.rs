use anyhow::{anyhow, Result};
use log::{error, info};
use poise::serenity_prelude as serenity;
use rand::rngs::StdRng;
use rand::SeedableRng;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::{Mutex, RwLock};

use crate::config::KenoConfig;
use crate::keno::{BetAmount, BoardSettings, Notification, Number, SelectionController};
use crate::view::render_reply;

type Context<'a> = poise::Context<'a, Data, anyhow::Error>;

/// One player's open board plus the notifications it has produced since the
/// last reply.
pub struct Session {
    controller: SelectionController,
    inbox: UnboundedReceiver<Notification>,
    last_used: Instant,
}

impl Session {
    fn open(settings: BoardSettings) -> Self {
        let (outbox, inbox) = mpsc::unbounded_channel();
        let controller = SelectionController::new(settings, move |n: Notification| {
            // Receiver lives as long as the session.
            let _ = outbox.send(n);
        });
        Self {
            controller,
            inbox,
            last_used: Instant::now(),
        }
    }

    fn reply(&mut self) -> String {
        let mut notifications = Vec::new();
        while let Ok(n) = self.inbox.try_recv() {
            notifications.push(n);
        }
        render_reply(
            &notifications,
            self.controller.state(),
            self.controller.settings(),
        )
    }
}

pub struct Data {
    pub config: Arc<RwLock<KenoConfig>>,
    pub config_path: PathBuf,
    pub boards: Mutex<HashMap<serenity::UserId, Session>>,
}

impl Data {
    async fn new(config_path: PathBuf) -> Result<Self> {
        let config = KenoConfig::load(&config_path).await?;
        info!("Loaded config from {}: {:?}", config_path.display(), config);
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
            boards: Mutex::new(HashMap::new()),
        })
    }

    async fn save_config(&self) -> Result<()> {
        let config = self.config.read().await;
        config.save(&self.config_path).await
    }

    /// Runs `action` against the user's board, opening one with the current
    /// settings if they have none, and returns the rendered reply. Boards
    /// idle past the configured timeout are dropped first.
    async fn play<F>(&self, user: serenity::UserId, action: F) -> Result<String>
    where
        F: FnOnce(&mut SelectionController) + Send,
    {
        let (settings, idle_timeout) = {
            let config = self.config.read().await;
            (config.board_settings()?, config.idle_timeout())
        };
        let mut boards = self.boards.lock().await;
        evict_idle(&mut boards, idle_timeout);
        let session = boards.entry(user).or_insert_with(|| Session::open(settings));
        session.last_used = Instant::now();
        action(&mut session.controller);
        Ok(session.reply())
    }
}

fn evict_idle(boards: &mut HashMap<serenity::UserId, Session>, idle_timeout: Duration) {
    let before = boards.len();
    boards.retain(|_, session| session.last_used.elapsed() < idle_timeout);
    let dropped = before - boards.len();
    if dropped > 0 {
        info!("Dropped {} idle boards", dropped);
    }
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum Stake {
    #[name = "10"]
    Ten,
    #[name = "20"]
    Twenty,
    #[name = "50"]
    Fifty,
    #[name = "100"]
    Hundred,
}

impl From<Stake> for BetAmount {
    fn from(stake: Stake) -> Self {
        match stake {
            Stake::Ten => BetAmount::Ten,
            Stake::Twenty => BetAmount::Twenty,
            Stake::Fifty => BetAmount::Fifty,
            Stake::Hundred => BetAmount::Hundred,
        }
    }
}

async fn respond(ctx: Context<'_>, content: String) -> Result<()> {
    ctx.send(
        poise::CreateReply::default()
            .content(content)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Shows your Keno board
#[poise::command(slash_command)]
async fn board(ctx: Context<'_>) -> Result<()> {
    let reply = ctx.data().play(ctx.author().id, |_| {}).await?;
    respond(ctx, reply).await
}

/// Marks a number on your board, or unmarks it if already marked
#[poise::command(slash_command)]
async fn pick(
    ctx: Context<'_>,
    #[description = "Number to toggle"]
    #[min = 1]
    #[max = 80]
    number: u8,
) -> Result<()> {
    let number = Number::try_from(number)?;
    let reply = ctx
        .data()
        .play(ctx.author().id, |board| {
            board.select_or_deselect(number);
        })
        .await?;
    respond(ctx, reply).await
}

/// Chooses your stake
#[poise::command(slash_command)]
async fn bet(
    ctx: Context<'_>,
    #[description = "Bet amount"] amount: Stake,
) -> Result<()> {
    let reply = ctx
        .data()
        .play(ctx.author().id, |board| board.set_bet(amount.into()))
        .await?;
    respond(ctx, reply).await
}

/// Unmarks every number on your board. Your bet stays.
#[poise::command(slash_command)]
async fn clear_selections(ctx: Context<'_>) -> Result<()> {
    let reply = ctx
        .data()
        .play(ctx.author().id, |board| board.clear())
        .await?;
    respond(ctx, reply).await
}

/// Marks random numbers for you
#[poise::command(slash_command)]
async fn quick_pick(
    ctx: Context<'_>,
    #[description = "How many numbers to add"]
    #[min = 1]
    #[max = 20]
    count: u8,
) -> Result<()> {
    let reply = ctx
        .data()
        .play(ctx.author().id, |board| {
            let mut rng = StdRng::from_entropy();
            // Rejections are already queued as notifications.
            let _ = board.quick_pick(usize::from(count), &mut rng);
        })
        .await?;
    respond(ctx, reply).await
}

/// Throws away your board
#[poise::command(slash_command)]
async fn close_board(ctx: Context<'_>) -> Result<()> {
    let closed = ctx
        .data()
        .boards
        .lock()
        .await
        .remove(&ctx.author().id)
        .is_some();
    let content = if closed {
        "Board closed."
    } else {
        "You have no open board."
    };
    respond(ctx, content.to_string()).await
}

#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
async fn set_bet_gate(
    ctx: poise::ApplicationContext<'_, Data, anyhow::Error>,
    #[description = "Require a bet before numbers can be picked"] enabled: bool,
) -> Result<()> {
    let mut config = ctx.data().config.write().await;
    config.require_bet_before_selection = enabled;
    drop(config); // Release the lock before saving
    ctx.data().save_config().await?;
    let state = if enabled { "required" } else { "optional" };
    ctx.say(format!(
        "A bet is now {} before picking. Applies to boards opened from now on.",
        state
    ))
    .await?;
    Ok(())
}

async fn event_handler(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, anyhow::Error>,
    data: &Data,
) -> Result<()> {
    if let serenity::FullEvent::Ready { data_about_bot, .. } = event {
        let open = data.boards.lock().await.len();
        info!(
            "Logged in as {} ({} boards open)",
            data_about_bot.user.name, open
        );
    }
    Ok(())
}

async fn on_error(err: poise::FrameworkError<'_, Data, anyhow::Error>) {
    if let poise::FrameworkError::Command { error, ctx, .. } = err {
        error!("Command /{} failed: {:?}", ctx.command().name, error);
        if let Err(why) = ctx.say(format!("Something went wrong: {}", error)).await {
            error!("Error sending message: {:?}", why);
        }
    } else if let Err(why) = poise::builtins::on_error(err).await {
        error!("Error while handling error: {:?}", why);
    }
}

pub async fn start() -> Result<()> {
    let token =
        std::env::var("DISCORD_TOKEN").map_err(|_| anyhow!("missing DISCORD_TOKEN"))?;
    let config_path = KenoConfig::path_from_env();
    let intents = serenity::GatewayIntents::non_privileged();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                board(),
                pick(),
                bet(),
                clear_selections(),
                quick_pick(),
                close_board(),
                set_bet_gate(),
            ],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |err| Box::pin(on_error(err)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Data::new(config_path).await
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;
    client.start().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stake_choices_match_menu() {
        let stakes = [Stake::Ten, Stake::Twenty, Stake::Fifty, Stake::Hundred];
        let values: Vec<u32> = stakes
            .iter()
            .map(|s| BetAmount::from(*s).value())
            .collect();
        assert_eq!(values, vec![10, 20, 50, 100]);
    }

    #[test]
    fn session_reply_drains_notifications() {
        let mut session = Session::open(BoardSettings::default());
        session.controller.select_or_deselect(Number::new(4));

        let first = session.reply();
        assert!(first.starts_with("⛔ Choose a bet amount first"));
        assert!(first.contains("Selected: 0/20"));

        let second = session.reply();
        assert!(second.starts_with("**KENO**"));
    }

    #[tokio::test]
    async fn play_opens_one_board_per_user() {
        let data = Data {
            config: Arc::new(RwLock::new(KenoConfig {
                require_bet_before_selection: false,
                opening_bet: Some(20),
                board_idle_minutes: 30,
            })),
            config_path: PathBuf::from("unused.json"),
            boards: Mutex::new(HashMap::new()),
        };
        let alice = serenity::UserId::new(1);
        let bob = serenity::UserId::new(2);

        data.play(alice, |b| {
            b.select_or_deselect(Number::new(9));
        })
        .await
        .unwrap();
        let reply = data.play(alice, |_| {}).await.unwrap();
        assert!(reply.contains("[ 9]"));
        assert!(reply.contains("Bet: 20"));

        let other = data.play(bob, |_| {}).await.unwrap();
        assert!(other.contains("Selected: 0/20"));
        assert_eq!(data.boards.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn idle_boards_are_dropped() {
        let data = Data {
            config: Arc::new(RwLock::new(KenoConfig {
                require_bet_before_selection: false,
                opening_bet: None,
                board_idle_minutes: 0,
            })),
            config_path: PathBuf::from("unused.json"),
            boards: Mutex::new(HashMap::new()),
        };
        let alice = serenity::UserId::new(1);
        let bob = serenity::UserId::new(2);

        data.play(alice, |b| {
            b.select_or_deselect(Number::new(9));
        })
        .await
        .unwrap();
        data.play(bob, |_| {}).await.unwrap();
        assert!(!data.boards.lock().await.contains_key(&alice));

        let reply = data.play(alice, |_| {}).await.unwrap();
        assert!(!reply.contains("[ 9]"));
        assert!(reply.contains("Selected: 0/20"));
    }
}

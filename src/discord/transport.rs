//! Discord Rich Presence transport using discord-sdk

use std::num::NonZeroU32;
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::time::Duration;

use discord_sdk::{
    activity::{ActivityBuilder, Assets, Button, PartyPrivacy as DiscordPartyPrivacy},
    wheel::{UserSpoke, UserState, Wheel},
    Discord, Subscriptions,
};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::error::RpcError;
use crate::presence::{
    PartyPrivacy, PlatformUser, PresencePayload, PresenceTransport, TransportFactory,
    TransportReadyCallback,
};

use super::TransportLogger;

/// How long `initialize` waits for Discord to accept the connection
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// Extra time the caller allows the task to report a handshake that timed out
const HANDSHAKE_GRACE: Duration = Duration::from_millis(500);
/// discord-sdk's disconnect does not return while its IO task is still reconnecting
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

type HandshakeResult = Result<PlatformUser, String>;

/// Creates [`DiscordTransport`]s whose background tasks run on `runtime`
pub struct DiscordTransportFactory {
    runtime: Handle,
}

impl DiscordTransportFactory {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Use the runtime of the calling context, if there is one
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl TransportFactory for DiscordTransportFactory {
    fn create(&self, app_id: i64) -> Box<dyn PresenceTransport> {
        Box::new(DiscordTransport::new(app_id, self.runtime.clone()))
    }
}

/// One Discord IPC connection.
///
/// Updates go through a watch channel to a single background task, so pushes
/// never overlap and a newer payload replaces one that has not been sent yet.
///
/// [`initialize`](PresenceTransport::initialize) blocks the calling thread until
/// Discord answers the handshake, so it must not run on one of `runtime`'s own
/// worker threads.
pub struct DiscordTransport {
    app_id: i64,
    runtime: Handle,
    handshake_timeout: Duration,
    update_tx: Option<watch::Sender<Option<PresencePayload>>>,
}

impl DiscordTransport {
    pub fn new(app_id: i64, runtime: Handle) -> Self {
        Self {
            app_id,
            runtime,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            update_tx: None,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Background task that owns the Discord connection.
    ///
    /// Reports the handshake outcome through `handshake_tx`, then pushes every
    /// payload it receives until the sender side of `update_rx` is dropped.
    async fn run_discord_task(
        discord: Discord,
        wheel: Wheel,
        mut update_rx: watch::Receiver<Option<PresencePayload>>,
        handshake_tx: SyncSender<HandshakeResult>,
        handshake_timeout: Duration,
        logger: TransportLogger,
    ) {
        logger.info("Discord connecting...");

        let mut user_spoke = wheel.user();
        let handshake =
            match tokio::time::timeout(handshake_timeout, wait_for_user(&mut user_spoke)).await {
                Ok(result) => result,
                Err(_) => Err("Discord handshake timed out".to_string()),
            };
        let connected = handshake.is_ok();
        // The caller may have stopped waiting already
        let _ = handshake_tx.send(handshake);

        if connected {
            while update_rx.changed().await.is_ok() {
                let Some(payload) = update_rx.borrow_and_update().clone() else {
                    continue;
                };

                logger.trace(format_args!("Pushing {:?} activity", payload.template()));
                if let Err(e) = discord.update_activity(activity_from_payload(&payload)).await {
                    logger.warning(format_args!("Failed to update Discord activity: {:?}", e));
                }
            }
        }

        if tokio::time::timeout(DISCONNECT_TIMEOUT, discord.disconnect())
            .await
            .is_err()
        {
            logger.trace("Discord disconnect timed out, dropping the connection");
        }
        logger.info("Discord Rich Presence disconnected");
    }
}

impl PresenceTransport for DiscordTransport {
    fn initialize(
        &mut self,
        logger: TransportLogger,
        on_ready: TransportReadyCallback,
    ) -> Result<(), RpcError> {
        let (update_tx, update_rx) = watch::channel(None);
        let (handshake_tx, handshake_rx) = mpsc::sync_channel(1);

        {
            // discord-sdk spawns its IO tasks on the current runtime
            let _guard = self.runtime.enter();

            let error_logger = logger.clone();
            let (wheel, handler) = Wheel::new(Box::new(move |err| {
                error_logger.error(format_args!("{:?}", err));
            }));

            let discord = Discord::new(self.app_id, Subscriptions::ACTIVITY, Box::new(handler))
                .map_err(|e| RpcError::TransportInit(format!("{:?}", e)))?;

            self.runtime.spawn(Self::run_discord_task(
                discord,
                wheel,
                update_rx,
                handshake_tx,
                self.handshake_timeout,
                logger.clone(),
            ));
        }

        // On failure update_tx is dropped here, which also ends the task
        let user = match handshake_rx.recv_timeout(self.handshake_timeout + HANDSHAKE_GRACE) {
            Ok(Ok(user)) => user,
            Ok(Err(e)) => {
                logger.warning(&e);
                return Err(RpcError::TransportInit(e));
            }
            Err(RecvTimeoutError::Timeout) => {
                logger.warning("Discord handshake timed out");
                return Err(RpcError::TransportInit(
                    "Discord handshake timed out".to_string(),
                ));
            }
            Err(RecvTimeoutError::Disconnected) => {
                logger.warning("Discord task ended before the handshake");
                return Err(RpcError::TransportInit(
                    "Discord task ended before the handshake".to_string(),
                ));
            }
        };

        logger.info(format_args!("Discord Rich Presence connected as {}", user.username));
        self.update_tx = Some(update_tx);
        on_ready(user);

        Ok(())
    }

    fn push(&self, payload: &PresencePayload) -> Result<(), RpcError> {
        let update_tx = self.update_tx.as_ref().ok_or(RpcError::NotReady)?;
        update_tx
            .send(Some(payload.clone()))
            .map_err(|_| RpcError::Push("Discord connection closed".to_string()))
    }

    fn dispose(&mut self) {
        // Closing the channel lets the task finish its current push and disconnect
        self.update_tx.take();
    }
}

async fn wait_for_user(user_spoke: &mut UserSpoke) -> HandshakeResult {
    if user_spoke.0.changed().await.is_err() {
        return Err("Discord connection closed".to_string());
    }

    match &*user_spoke.0.borrow() {
        UserState::Connected(user) => {
            let username = match user.discriminator {
                Some(discriminator) if discriminator != 0 => {
                    format!("{}#{:04}", user.username, discriminator)
                }
                _ => user.username.clone(),
            };
            Ok(PlatformUser {
                username,
                user_id: user.id.0.to_string(),
            })
        }
        UserState::Disconnected(err) => Err(format!("Discord disconnected: {:?}", err)),
    }
}

fn activity_from_payload(payload: &PresencePayload) -> ActivityBuilder {
    let mut activity = ActivityBuilder::new();

    if let Some(start) = payload.timestamp_start() {
        activity = activity.start_timestamp(start);
    }
    if let Some(state) = payload.state() {
        activity = activity.state(state);
    }
    if let Some(details) = payload.details() {
        activity = activity.details(details);
    }

    // discord-sdk has no field for image links, so large_url is not forwarded
    let assets = payload.assets();
    let mut discord_assets = Assets::default().large(assets.large_image(), assets.large_text());
    if let Some(small) = assets.small_image() {
        discord_assets = discord_assets.small(small, None::<&str>);
    }
    activity = activity.assets(discord_assets);

    if let Some(party) = payload.party() {
        let privacy = match party.privacy() {
            PartyPrivacy::Private => DiscordPartyPrivacy::Private,
            PartyPrivacy::Public => DiscordPartyPrivacy::Public,
        };
        activity = activity.party(
            party.id(),
            NonZeroU32::new(party.size()),
            NonZeroU32::new(party.max()),
            privacy,
        );
    }

    for button in payload.buttons() {
        activity = activity.button(Button {
            label: button.label.clone(),
            url: button.url.clone(),
        });
    }

    activity
}

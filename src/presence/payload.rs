//! Presence payloads and the rules that derive them from a world

use std::time::{Duration, SystemTime};

use crate::host::{Localizer, SessionLinks, WorldDirectory, WorldSnapshot};
use crate::settings::{FeatureFlags, RichPresenceLevel};

pub const DEFAULT_LARGE_IMAGE: &str = "resonite-logo";
pub const DEFAULT_SMALL_IMAGE: &str = "resonite-logo";

/// Discord refuses activities with more buttons than this
pub const MAX_BUTTONS: usize = 2;

/// Session thumbnails are generated a while after the world starts
pub const THUMBNAIL_MIN_WORLD_TIME: Duration = Duration::from_secs(150);

const KEY_IN_PRIVATE_WORLD: &str = "Discord.RichPresence.InPrivateWorld";
const KEY_PUBLIC_WORLD_DETAILS: &str = "Discord.RichPresence.PublicWorldDetails";
const KEY_SESSION_INFORMATION: &str = "World.Detail.SessionInformationHeader";
const KEY_JOIN: &str = "World.Actions.Join";

/// Which of the three shapes a payload was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceTemplate {
    Blank,
    Private,
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceAssets {
    large_image: String,
    large_text: Option<String>,
    large_url: Option<String>,
    small_image: Option<String>,
}

impl PresenceAssets {
    fn default_image() -> Self {
        Self {
            large_image: DEFAULT_LARGE_IMAGE.to_string(),
            large_text: None,
            large_url: None,
            small_image: None,
        }
    }

    pub fn large_image(&self) -> &str {
        &self.large_image
    }

    pub fn large_text(&self) -> Option<&str> {
        self.large_text.as_deref()
    }

    pub fn large_url(&self) -> Option<&str> {
        self.large_url.as_deref()
    }

    pub fn small_image(&self) -> Option<&str> {
        self.small_image.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyPrivacy {
    Private,
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceParty {
    id: String,
    privacy: PartyPrivacy,
    size: u32,
    max: u32,
}

impl PresenceParty {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn privacy(&self) -> PartyPrivacy {
        self.privacy
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn max(&self) -> u32 {
        self.max
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceButton {
    pub label: String,
    pub url: String,
}

/// The activity shown on the user's Discord profile.
///
/// Only the constructors in this module can build one, so every payload is
/// exactly one of the blank, private or public shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresencePayload {
    template: PresenceTemplate,
    timestamp_start: Option<SystemTime>,
    state: Option<String>,
    details: Option<String>,
    assets: PresenceAssets,
    party: Option<PresenceParty>,
    buttons: Vec<PresenceButton>,
}

impl PresencePayload {
    /// Nothing but the default logo
    pub fn blank() -> Self {
        Self {
            template: PresenceTemplate::Blank,
            timestamp_start: None,
            state: None,
            details: None,
            assets: PresenceAssets::default_image(),
            party: None,
            buttons: Vec::new(),
        }
    }

    pub fn template(&self) -> PresenceTemplate {
        self.template
    }

    pub fn is_blank(&self) -> bool {
        self.template == PresenceTemplate::Blank
    }

    pub fn timestamp_start(&self) -> Option<SystemTime> {
        self.timestamp_start
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn assets(&self) -> &PresenceAssets {
        &self.assets
    }

    pub fn party(&self) -> Option<&PresenceParty> {
        self.party.as_ref()
    }

    pub fn buttons(&self) -> &[PresenceButton] {
        &self.buttons
    }
}

/// Builds payloads from host lookups (localization, session links, world list)
pub struct PayloadBuilder<'a, H: ?Sized> {
    host: &'a H,
}

impl<'a, H> PayloadBuilder<'a, H>
where
    H: Localizer + SessionLinks + WorldDirectory + ?Sized,
{
    pub fn new(host: &'a H) -> Self {
        Self { host }
    }

    pub fn build(
        &self,
        world: &WorldSnapshot,
        is_private: bool,
        level: RichPresenceLevel,
        flags: FeatureFlags,
    ) -> PresencePayload {
        match level {
            RichPresenceLevel::None => PresencePayload::blank(),
            RichPresenceLevel::Basic => self.private(world),
            RichPresenceLevel::Full if is_private => self.private(world),
            RichPresenceLevel::Full => self.public(world, flags),
        }
    }

    /// Must not reveal anything about the world beyond when the session began
    fn private(&self, world: &WorldSnapshot) -> PresencePayload {
        PresencePayload {
            template: PresenceTemplate::Private,
            timestamp_start: Some(world.session_begin),
            state: Some(self.host.get_localized(KEY_IN_PRIVATE_WORLD, &[])),
            details: None,
            assets: PresenceAssets::default_image(),
            party: None,
            buttons: Vec::new(),
        }
    }

    fn public(&self, world: &WorldSnapshot, flags: FeatureFlags) -> PresencePayload {
        let session_url = self.host.session_web_uri(&world.session_id).to_string();
        let raw_name = strip_rich_text(&world.name);

        let public_worlds = self
            .host
            .worlds()
            .iter()
            .filter(|w| w.counts_as_public())
            .count();
        let details = self.host.get_localized(
            KEY_PUBLIC_WORLD_DETAILS,
            &[
                ("worldName", world.localized_name.clone()),
                ("totalWorlds", public_worlds.to_string()),
            ],
        );

        let assets = if flags.show_thumbnail && world.local_world_time >= THUMBNAIL_MIN_WORLD_TIME
        {
            let mut assets = PresenceAssets {
                large_image: format!("{}/thumbnail", session_url.trim_end_matches('/')),
                large_text: None,
                large_url: None,
                small_image: Some(DEFAULT_SMALL_IMAGE.to_string()),
            };
            if flags.show_session_info_link {
                assets.large_text = Some(raw_name.clone());
                assets.large_url = Some(session_url.clone());
            }
            assets
        } else {
            // The thumbnail has probably not been generated yet
            PresenceAssets::default_image()
        };

        let mut buttons = Vec::with_capacity(MAX_BUTTONS);
        if flags.show_session_info_link {
            buttons.push(PresenceButton {
                label: self.host.get_localized(KEY_SESSION_INFORMATION, &[]),
                url: session_url,
            });
        }
        if flags.show_join_button {
            buttons.push(PresenceButton {
                label: self.host.get_localized(KEY_JOIN, &[]),
                url: self.host.session_join_uri(&world.session_id).to_string(),
            });
        }
        buttons.truncate(MAX_BUTTONS);

        PresencePayload {
            template: PresenceTemplate::Public,
            timestamp_start: Some(world.session_begin),
            state: Some(raw_name),
            details: Some(details),
            assets,
            party: Some(PresenceParty {
                id: world.session_id.clone(),
                privacy: PartyPrivacy::Public,
                size: world.user_count,
                max: world.max_users,
            }),
            buttons,
        }
    }
}

/// Drop rich-text tags such as `<b>` or `<color=#f00>` from a world name.
///
/// Text inside `<noparse>` is kept verbatim, and anything between angle
/// brackets that does not look like a tag (`a <3 b`) is left alone.
pub fn strip_rich_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut noparse = false;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(close) = after.find('>') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let tag = &after[..close];

        if noparse {
            if tag.eq_ignore_ascii_case("/noparse") {
                noparse = false;
            } else {
                out.push('<');
                out.push_str(tag);
                out.push('>');
            }
        } else if tag.eq_ignore_ascii_case("noparse") {
            noparse = true;
        } else if !is_tag(tag) {
            out.push('<');
            out.push_str(tag);
            out.push('>');
        }

        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

fn is_tag(tag: &str) -> bool {
    let body = tag.strip_prefix('/').unwrap_or(tag);
    let name = body.split(['=', ' ']).next().unwrap_or_default();

    name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

//! Domain types shared by all stores.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::StoreError;

/// Chat mode assigned to a player that never picked one.
pub const DEFAULT_CHAT_TYPE: &str = "local";

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl FromStr for $name {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| StoreError::MalformedIdentifier(s.to_string()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0.hyphenated(), f)
            }
        }
    };
}

uuid_identifier!(
    /// Stable identifier of a player account.
    PlayerId
);

uuid_identifier!(
    /// Identifier of a stored mail message.
    MailId
);

// ── Profile ────────────────────────────────────────────────────────────

/// Foreground/background color codes used when rendering a player's chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatColors {
    pub foreground: String,
    pub background: String,
}

impl ChatColors {
    pub fn new(foreground: impl Into<String>, background: impl Into<String>) -> Self {
        Self {
            foreground: foreground.into(),
            background: background.into(),
        }
    }
}

impl Default for ChatColors {
    fn default() -> Self {
        Self::new("&f", "&7")
    }
}

/// Per-player chat toggles. Each one is stored in its own `players` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatFeature {
    Advancement,
    Death,
    Join,
    Quit,
    Me,
    Try,
    TryCube,
    Ball,
    Tempban,
    Mute,
    Warn,
    Msg,
    Reply,
    Mail,
    TicTacToe,
}

impl ChatFeature {
    pub const ALL: [ChatFeature; 15] = [
        ChatFeature::Advancement,
        ChatFeature::Death,
        ChatFeature::Join,
        ChatFeature::Quit,
        ChatFeature::Me,
        ChatFeature::Try,
        ChatFeature::TryCube,
        ChatFeature::Ball,
        ChatFeature::Tempban,
        ChatFeature::Mute,
        ChatFeature::Warn,
        ChatFeature::Msg,
        ChatFeature::Reply,
        ChatFeature::Mail,
        ChatFeature::TicTacToe,
    ];

    /// Option key used by the chat settings of the host.
    pub fn key(self) -> &'static str {
        match self {
            ChatFeature::Advancement => "advancement",
            ChatFeature::Death => "death",
            ChatFeature::Join => "join",
            ChatFeature::Quit => "quit",
            ChatFeature::Me => "me",
            ChatFeature::Try => "try",
            ChatFeature::TryCube => "try-cube",
            ChatFeature::Ball => "ball",
            ChatFeature::Tempban => "tempban",
            ChatFeature::Mute => "mute",
            ChatFeature::Warn => "warn",
            ChatFeature::Msg => "msg",
            ChatFeature::Reply => "reply",
            ChatFeature::Mail => "mail",
            ChatFeature::TicTacToe => "tic-tac-toe",
        }
    }

    /// Column of the `players` table holding this toggle.
    pub fn column(self) -> &'static str {
        match self {
            ChatFeature::Advancement => "enable_advancements",
            ChatFeature::Death => "enable_deaths",
            ChatFeature::Join => "enable_joins",
            ChatFeature::Quit => "enable_quits",
            ChatFeature::Me => "enable_command_me",
            ChatFeature::Try => "enable_command_try",
            ChatFeature::TryCube => "enable_command_try_cube",
            ChatFeature::Ball => "enable_command_ball",
            ChatFeature::Tempban => "enable_command_tempban",
            ChatFeature::Mute => "enable_command_mute",
            ChatFeature::Warn => "enable_command_warn",
            ChatFeature::Msg => "enable_command_msg",
            ChatFeature::Reply => "enable_command_reply",
            ChatFeature::Mail => "enable_command_mail",
            ChatFeature::TicTacToe => "enable_command_tic_tac_toe",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|feature| feature.key() == key)
    }
}

/// Chat mode plus the per-feature toggles. A toggle that was never set
/// reads as enabled, so two settings compare equal when every feature
/// resolves the same way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    pub chat_type: String,
    options: BTreeMap<ChatFeature, bool>,
}

impl ChatSettings {
    pub fn new(chat_type: impl Into<String>) -> Self {
        Self {
            chat_type: chat_type.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn is_enabled(&self, feature: ChatFeature) -> bool {
        self.options.get(&feature).copied().unwrap_or(true)
    }

    pub fn set_enabled(&mut self, feature: ChatFeature, enabled: bool) {
        self.options.insert(feature, enabled);
    }
}

impl PartialEq for ChatSettings {
    fn eq(&self, other: &Self) -> bool {
        self.chat_type == other.chat_type
            && ChatFeature::ALL
                .into_iter()
                .all(|feature| self.is_enabled(feature) == other.is_enabled(feature))
    }
}

impl Eq for ChatSettings {}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::new(DEFAULT_CHAT_TYPE)
    }
}

/// Everything stored on a player's `players` row, with the mail references
/// materialized into messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerProfile {
    pub id: PlayerId,
    pub colors: ChatColors,
    pub chat: ChatSettings,
    ignore_list: Vec<PlayerId>,
    mails: Vec<MailMessage>,
}

impl PlayerProfile {
    /// A profile with default colors, default chat settings and no
    /// ignored players or mail.
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            colors: ChatColors::default(),
            chat: ChatSettings::default(),
            ignore_list: Vec::new(),
            mails: Vec::new(),
        }
    }

    pub fn ignore_list(&self) -> &[PlayerId] {
        &self.ignore_list
    }

    pub fn is_ignoring(&self, player: PlayerId) -> bool {
        self.ignore_list.contains(&player)
    }

    /// Returns `false` if the player was already ignored.
    pub fn ignore(&mut self, player: PlayerId) -> bool {
        if self.is_ignoring(player) {
            return false;
        }
        self.ignore_list.push(player);
        true
    }

    pub fn unignore(&mut self, player: PlayerId) -> bool {
        let before = self.ignore_list.len();
        self.ignore_list.retain(|p| *p != player);
        self.ignore_list.len() != before
    }

    /// Replace the ignore list, dropping duplicates.
    pub fn set_ignore_list(&mut self, players: impl IntoIterator<Item = PlayerId>) {
        self.ignore_list.clear();
        for player in players {
            self.ignore(player);
        }
    }

    pub fn mails(&self) -> &[MailMessage] {
        &self.mails
    }

    pub fn mail_ids(&self) -> impl Iterator<Item = MailId> + '_ {
        self.mails.iter().map(|mail| mail.id)
    }

    /// Returns `false` if a mail with the same id is already held.
    pub fn add_mail(&mut self, mail: MailMessage) -> bool {
        if self.mails.iter().any(|m| m.id == mail.id) {
            return false;
        }
        self.mails.push(mail);
        true
    }

    pub fn remove_mail(&mut self, id: MailId) -> Option<MailMessage> {
        let index = self.mails.iter().position(|m| m.id == id)?;
        Some(self.mails.remove(index))
    }
}

/// The logical field of a profile written by a single `save_field` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Colors,
    IgnoreList,
    Mails,
    Chat,
}

impl ProfileField {
    pub fn name(self) -> &'static str {
        match self {
            ProfileField::Colors => "colors",
            ProfileField::IgnoreList => "ignore_list",
            ProfileField::Mails => "mails",
            ProfileField::Chat => "chat",
        }
    }
}

// ── Moderation ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModerationKind {
    Ban,
    Mute,
    Warn,
}

impl ModerationKind {
    /// Table backing this kind of record. Warns have no defined record
    /// layout yet, so every operation on them is rejected here.
    pub fn table(self) -> Result<&'static str, StoreError> {
        match self {
            ModerationKind::Ban => Ok("bans"),
            ModerationKind::Mute => Ok("mutes"),
            ModerationKind::Warn => Err(StoreError::UnsupportedOperation("warns")),
        }
    }
}

/// When a restriction ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expiry {
    Permanent,
    /// Unix timestamp in seconds.
    At(i64),
}

/// One active ban, mute or warn. At most one exists per player and kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationRecord {
    pub player: PlayerId,
    pub expiry: Expiry,
    pub reason: String,
    /// Records carried over from the legacy layout have no moderator.
    pub moderator: Option<String>,
}

impl ModerationRecord {
    pub fn is_expired(&self, now: i64) -> bool {
        match self.expiry {
            Expiry::Permanent => false,
            Expiry::At(time) => time <= now,
        }
    }
}

// ── Mail ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    pub id: MailId,
    pub sender: PlayerId,
    pub receiver: PlayerId,
    pub body: String,
}

impl MailMessage {
    /// Compose a new message with a fresh id.
    pub fn compose(sender: PlayerId, receiver: PlayerId, body: impl Into<String>) -> Self {
        Self {
            id: MailId::random(),
            sender,
            receiver,
            body: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_parse_and_display() {
        let raw = "5f0c7a1e-3b2d-4c1a-9e8f-0a1b2c3d4e5f";
        let id: PlayerId = raw.parse().unwrap();
        assert_eq!(id.to_string(), raw);
        let uuid: Uuid = raw.parse().unwrap();
        assert_eq!(PlayerId::from(uuid), id);
    }

    #[test]
    fn malformed_identifier_is_rejected() {
        let err = "not-a-uuid".parse::<MailId>().unwrap_err();
        assert!(matches!(err, StoreError::MalformedIdentifier(ref t) if t == "not-a-uuid"));
    }

    #[test]
    fn ignore_list_has_no_duplicates() {
        let a = PlayerId::random();
        let b = PlayerId::random();
        let mut profile = PlayerProfile::new(PlayerId::random());
        profile.set_ignore_list([a, b, a]);
        assert_eq!(profile.ignore_list(), &[a, b]);
        assert!(!profile.ignore(b));
        assert!(profile.unignore(a));
        assert!(!profile.is_ignoring(a));
    }

    #[test]
    fn unset_chat_feature_is_enabled() {
        let mut chat = ChatSettings::default();
        assert_eq!(chat.chat_type, "local");
        assert!(chat.is_enabled(ChatFeature::Death));
        chat.set_enabled(ChatFeature::Death, false);
        assert!(!chat.is_enabled(ChatFeature::Death));
    }

    #[test]
    fn chat_feature_keys_round_trip() {
        for feature in ChatFeature::ALL {
            assert_eq!(ChatFeature::from_key(feature.key()), Some(feature));
            assert!(feature.column().starts_with("enable_"));
        }
        assert_eq!(ChatFeature::from_key("fly"), None);
    }

    #[test]
    fn mail_set_is_keyed_by_id() {
        let sender = PlayerId::random();
        let mut profile = PlayerProfile::new(PlayerId::random());
        let mail = MailMessage::compose(sender, profile.id, "hi");
        assert!(profile.add_mail(mail.clone()));
        assert!(!profile.add_mail(mail.clone()));
        assert_eq!(profile.remove_mail(mail.id), Some(mail));
        assert!(profile.mails().is_empty());
    }

    #[test]
    fn warns_are_unsupported() {
        assert_eq!(ModerationKind::Ban.table().unwrap(), "bans");
        assert_eq!(ModerationKind::Mute.table().unwrap(), "mutes");
        assert!(matches!(
            ModerationKind::Warn.table(),
            Err(StoreError::UnsupportedOperation("warns"))
        ));
    }

    #[test]
    fn profile_serializes_with_feature_keys() {
        let mut profile = PlayerProfile::new(PlayerId::random());
        profile.chat.set_enabled(ChatFeature::TicTacToe, false);

        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["id"], profile.id.to_string());
        assert_eq!(json["colors"]["foreground"], "&f");
        assert_eq!(json["chat"]["options"]["tic-tac-toe"], false);
    }

    #[test]
    fn permanent_records_never_expire() {
        let mut record = ModerationRecord {
            player: PlayerId::random(),
            expiry: Expiry::Permanent,
            reason: "griefing".to_string(),
            moderator: None,
        };
        assert!(!record.is_expired(i64::MAX));
        record.expiry = Expiry::At(100);
        assert!(!record.is_expired(99));
        assert!(record.is_expired(100));
    }
}

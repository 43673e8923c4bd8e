//! Deprecation, preview, and experimental status metadata.
//!
//! Status objects attach to commands, groups, and arguments. They affect
//! help visibility (`hidden`/`show_in_help`), emit warnings when the target
//! is used, and for deprecations enforce an expiration version after which
//! the target stops existing entirely. Tag and message construction is
//! pluggable so the same machinery serves all three statuses with different
//! copy.

use std::sync::Arc;

use colored::Color;

/// Identity fields shared by every status object and handed to the pluggable
/// tag/message functions.
#[derive(Clone, Debug, Default)]
pub struct StatusInfo {
    /// A label describing the kind of entity ("command", "command group",
    /// "argument", "option").
    pub object_type: String,
    /// The name of the affected entity.
    pub target: String,
    /// Replacement to point users at, if any.
    pub redirect: Option<String>,
    /// Version at or above which the entity stops working (deprecations
    /// only).
    pub expiration: Option<String>,
}

pub type StatusTextFunc = Arc<dyn Fn(&StatusInfo) -> String + Send + Sync>;

/// Compare two dotted version strings, component-wise. Numeric components
/// compare numerically, anything else falls back to lexical comparison;
/// missing components count as zero. Returns true when `a <= b`.
pub fn version_le(a: &str, b: &str) -> bool {
    let left: Vec<&str> = a.split('.').collect();
    let right: Vec<&str> = b.split('.').collect();
    let len = left.len().max(right.len());
    for i in 0..len {
        let lc = left.get(i).copied().unwrap_or("0");
        let rc = right.get(i).copied().unwrap_or("0");
        match (lc.parse::<u64>(), rc.parse::<u64>()) {
            (Ok(l), Ok(r)) => {
                if l != r {
                    return l < r;
                }
            }
            _ => {
                if lc != rc {
                    return lc < rc;
                }
            }
        }
    }
    true
}

/// When a deprecated entity disappears from help output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Hide {
    #[default]
    Never,
    Always,
    /// Hidden once the running CLI version reaches this version.
    AtVersion(String),
}

const DEPRECATED_TAG: &str = "[Deprecated]";
const PREVIEW_TAG: &str = "[Preview]";
const EXPERIMENTAL_TAG: &str = "[Experimental]";

/// Deprecation metadata for a command, group, argument, or option.
#[derive(Clone)]
pub struct Deprecated {
    pub info: StatusInfo,
    pub hide: Hide,
    tag_func: Option<StatusTextFunc>,
    message_func: Option<StatusTextFunc>,
}

impl std::fmt::Debug for Deprecated {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deprecated")
            .field("info", &self.info)
            .field("hide", &self.hide)
            .finish()
    }
}

impl Deprecated {
    pub fn new(object_type: impl Into<String>, target: impl Into<String>) -> Self {
        Deprecated {
            info: StatusInfo {
                object_type: object_type.into(),
                target: target.into(),
                redirect: None,
                expiration: None,
            },
            hide: Hide::Never,
            tag_func: None,
            message_func: None,
        }
    }

    pub fn command(target: impl Into<String>) -> Self {
        Deprecated::new("command", target)
    }

    pub fn command_group(target: impl Into<String>) -> Self {
        Deprecated::new("command group", target)
    }

    pub fn argument(target: impl Into<String>) -> Self {
        Deprecated::new("argument", target)
    }

    /// Deprecate one specific option string of an argument.
    pub fn option(target: impl Into<String>) -> Self {
        Deprecated::new("option", target)
    }

    pub fn redirect(mut self, redirect: impl Into<String>) -> Self {
        self.info.redirect = Some(redirect.into());
        self
    }

    pub fn expiration(mut self, version: impl Into<String>) -> Self {
        self.info.expiration = Some(version.into());
        self
    }

    pub fn hide(mut self, hide: Hide) -> Self {
        self.hide = hide;
        self
    }

    pub fn tag_func(mut self, func: StatusTextFunc) -> Self {
        self.tag_func = Some(func);
        self
    }

    pub fn message_func(mut self, func: StatusTextFunc) -> Self {
        self.message_func = Some(func);
        self
    }

    /// Build the implicit deprecation a child inherits from a deprecated
    /// enclosing group: same redirect/expiration, empty tag, and a message
    /// naming the group.
    pub fn implicit(object_type: impl Into<String>, group: &Deprecated) -> Self {
        let group_name = group.info.target.clone();
        let mut implicit = Deprecated::new(object_type, group_name);
        implicit.info.redirect = group.info.redirect.clone();
        implicit.info.expiration = group.info.expiration.clone();
        implicit.hide = group.hide.clone();
        implicit.tag_func = Some(Arc::new(|_| String::new()));
        implicit.message_func = Some(Arc::new(|info: &StatusInfo| {
            let mut msg = format!(
                "This {} is implicitly deprecated because command group '{}' is deprecated and will be removed ",
                info.object_type, info.target
            );
            match &info.expiration {
                Some(version) => msg.push_str(&format!("in version '{}'.", version)),
                None => msg.push_str("in a future release."),
            }
            if let Some(redirect) = &info.redirect {
                msg.push_str(&format!(" Use '{}' instead.", redirect));
            }
            msg
        }));
        implicit
    }

    /// True once the running CLI version has reached the expiration version.
    pub fn expired(&self, cli_version: &str) -> bool {
        match &self.info.expiration {
            Some(expiration) => version_le(expiration, cli_version),
            None => false,
        }
    }

    pub fn hidden(&self, cli_version: &str) -> bool {
        match &self.hide {
            Hide::Never => false,
            Hide::Always => true,
            Hide::AtVersion(version) => version_le(version, cli_version),
        }
    }

    pub fn show_in_help(&self, cli_version: &str) -> bool {
        !self.hidden(cli_version) && !self.expired(cli_version)
    }

    pub fn tag(&self) -> String {
        match &self.tag_func {
            Some(func) => func(&self.info),
            None => DEPRECATED_TAG.to_string(),
        }
    }

    pub fn message(&self) -> String {
        if let Some(func) = &self.message_func {
            return func(&self.info);
        }
        let mut msg = format!(
            "This {} has been deprecated and will be removed ",
            self.info.object_type
        );
        match &self.info.expiration {
            Some(version) => msg.push_str(&format!("in version '{}'.", version)),
            None => msg.push_str("in a future release."),
        }
        if let Some(redirect) = &self.info.redirect {
            msg.push_str(&format!(" Use '{}' instead.", redirect));
        }
        msg
    }

    pub fn color(&self) -> Color {
        Color::Yellow
    }
}

/// Preview metadata: the entity works but is subject to change.
#[derive(Clone)]
pub struct PreviewItem {
    pub info: StatusInfo,
    tag_func: Option<StatusTextFunc>,
    message_func: Option<StatusTextFunc>,
}

impl std::fmt::Debug for PreviewItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewItem").field("info", &self.info).finish()
    }
}

impl PreviewItem {
    pub fn new(object_type: impl Into<String>, target: impl Into<String>) -> Self {
        PreviewItem {
            info: StatusInfo {
                object_type: object_type.into(),
                target: target.into(),
                redirect: None,
                expiration: None,
            },
            tag_func: None,
            message_func: None,
        }
    }

    pub fn command(target: impl Into<String>) -> Self {
        PreviewItem::new("command", target)
    }

    pub fn command_group(target: impl Into<String>) -> Self {
        PreviewItem::new("command group", target)
    }

    pub fn tag_func(mut self, func: StatusTextFunc) -> Self {
        self.tag_func = Some(func);
        self
    }

    pub fn message_func(mut self, func: StatusTextFunc) -> Self {
        self.message_func = Some(func);
        self
    }

    pub fn implicit(object_type: impl Into<String>, group: &PreviewItem) -> Self {
        let mut implicit = PreviewItem::new(object_type, group.info.target.clone());
        implicit.tag_func = Some(Arc::new(|_| String::new()));
        implicit.message_func = Some(Arc::new(|info: &StatusInfo| {
            format!(
                "Command group '{}' is in preview. It may be changed/removed in a future release.",
                info.target
            )
        }));
        implicit
    }

    pub fn show_in_help(&self) -> bool {
        true
    }

    pub fn tag(&self) -> String {
        match &self.tag_func {
            Some(func) => func(&self.info),
            None => PREVIEW_TAG.to_string(),
        }
    }

    pub fn message(&self) -> String {
        match &self.message_func {
            Some(func) => func(&self.info),
            None => format!(
                "This {} is in preview. It may be changed/removed in a future release.",
                self.info.object_type
            ),
        }
    }

    pub fn color(&self) -> Color {
        Color::Cyan
    }
}

/// Experimental metadata: the entity is under active development.
#[derive(Clone)]
pub struct ExperimentalItem {
    pub info: StatusInfo,
    tag_func: Option<StatusTextFunc>,
    message_func: Option<StatusTextFunc>,
}

impl std::fmt::Debug for ExperimentalItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentalItem")
            .field("info", &self.info)
            .finish()
    }
}

impl ExperimentalItem {
    pub fn new(object_type: impl Into<String>, target: impl Into<String>) -> Self {
        ExperimentalItem {
            info: StatusInfo {
                object_type: object_type.into(),
                target: target.into(),
                redirect: None,
                expiration: None,
            },
            tag_func: None,
            message_func: None,
        }
    }

    pub fn command(target: impl Into<String>) -> Self {
        ExperimentalItem::new("command", target)
    }

    pub fn command_group(target: impl Into<String>) -> Self {
        ExperimentalItem::new("command group", target)
    }

    pub fn tag_func(mut self, func: StatusTextFunc) -> Self {
        self.tag_func = Some(func);
        self
    }

    pub fn message_func(mut self, func: StatusTextFunc) -> Self {
        self.message_func = Some(func);
        self
    }

    pub fn implicit(object_type: impl Into<String>, group: &ExperimentalItem) -> Self {
        let mut implicit = ExperimentalItem::new(object_type, group.info.target.clone());
        implicit.tag_func = Some(Arc::new(|_| String::new()));
        implicit.message_func = Some(Arc::new(|info: &StatusInfo| {
            format!(
                "Command group '{}' is experimental and under development.",
                info.target
            )
        }));
        implicit
    }

    pub fn show_in_help(&self) -> bool {
        true
    }

    pub fn tag(&self) -> String {
        match &self.tag_func {
            Some(func) => func(&self.info),
            None => EXPERIMENTAL_TAG.to_string(),
        }
    }

    pub fn message(&self) -> String {
        match &self.message_func {
            Some(func) => func(&self.info),
            None => format!(
                "This {} is experimental and under development.",
                self.info.object_type
            ),
        }
    }

    pub fn color(&self) -> Color {
        Color::Cyan
    }
}

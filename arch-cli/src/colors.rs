//! `LS_COLORS`-driven coloring for the `list` tool.
//!
//! Grounded on `original_source/examples/list/colors.cc` /
//! `colors.hh`: the same builtin fallback string, the same
//! two-letter-code-to-kind table, and the same by-extension matching
//! via `types_`/`exts_` maps.

use std::collections::HashMap;
use std::env;

use arch::EntryType;

const LS_COLORS_BUILTIN: &str = "rs=0:di=01;34:ln=01;36:mh=00:pi=40;33:so=01;35:do=01;35:bd=40;33;\
01:cd=40;33;01:or=40;31;01:mi=00:su=37;41:sg=30;43:ca=30;41:tw=30;42:ow=34;42:st=37;44:ex=01;32:";

/// The categories `LS_COLORS` assigns colors to: every [`EntryType`]
/// plus three synthetic kinds with no archive-entry equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LsType {
    /// See [`EntryType::None`].
    None,
    /// See [`EntryType::NotFound`].
    NotFound,
    /// See [`EntryType::Regular`].
    Regular,
    /// See [`EntryType::Directory`].
    Directory,
    /// See [`EntryType::Symlink`].
    Symlink,
    /// See [`EntryType::Block`].
    Block,
    /// See [`EntryType::Character`].
    Character,
    /// See [`EntryType::Fifo`].
    Fifo,
    /// See [`EntryType::Socket`].
    Socket,
    /// See [`EntryType::Unknown`].
    Unknown,
    /// The `rs=` reset sequence.
    Reset,
    /// A dangling symlink (`or=`).
    Orphan,
    /// A regular file with any executable bit set (`ex=`).
    Executable,
}

impl From<EntryType> for LsType {
    fn from(kind: EntryType) -> Self {
        match kind {
            EntryType::None => LsType::None,
            EntryType::NotFound => LsType::NotFound,
            EntryType::Regular => LsType::Regular,
            EntryType::Directory => LsType::Directory,
            EntryType::Symlink => LsType::Symlink,
            EntryType::Block => LsType::Block,
            EntryType::Character => LsType::Character,
            EntryType::Fifo => LsType::Fifo,
            EntryType::Socket => LsType::Socket,
            EntryType::Unknown => LsType::Unknown,
        }
    }
}

fn code_to_type(code: &str) -> Option<LsType> {
    Some(match code {
        "bd" => LsType::Block,
        "cd" => LsType::Character,
        "di" => LsType::Directory,
        "ex" => LsType::Executable,
        "ln" => LsType::Symlink,
        "mi" => LsType::NotFound,
        "no" => LsType::Regular,
        "or" => LsType::Orphan,
        "pi" => LsType::Fifo,
        "rs" => LsType::Reset,
        "so" => LsType::Socket,
        _ => return None,
    })
}

/// Parses `LS_COLORS`-style strings and renders colored filenames.
pub struct Painter {
    types: HashMap<LsType, String>,
    exts: HashMap<String, String>,
    reset: String,
}

impl Painter {
    /// Build a painter from the `LS_COLORS` environment variable, or
    /// this tool's builtin fallback when it's unset.
    pub fn from_env() -> Self {
        let env = env::var("LS_COLORS").unwrap_or_else(|_| LS_COLORS_BUILTIN.to_string());
        Self::parse(&env)
    }

    fn parse(spec: &str) -> Self {
        let mut types = HashMap::new();
        let mut exts = HashMap::new();

        for item in spec.split(':') {
            let item = item.trim();
            let Some((name, value)) = item.split_once('=') else {
                continue;
            };
            let name = name.trim();
            let value = value.trim();
            if name.is_empty() || value.is_empty() {
                continue;
            }

            if let Some(kind) = code_to_type(name) {
                types.insert(kind, value.to_string());
                continue;
            }

            if let Some(rest) = name.strip_prefix('*') {
                if rest.starts_with('.') {
                    exts.insert(rest.to_string(), value.to_string());
                }
            }
        }

        let reset = match types.get(&LsType::Reset) {
            Some(code) => format!("\x1b[{code}m"),
            None => String::new(),
        };

        Painter {
            types,
            exts,
            reset,
        }
    }

    fn find_color(&self, printed: &str, kind: LsType, perms: u32) -> Option<&str> {
        let has_exec = perms & 0o111 != 0;

        if let Some(code) = self.types.get(&kind) {
            return Some(code);
        }
        if has_exec {
            if let Some(code) = self.types.get(&LsType::Executable) {
                return Some(code);
            }
        }

        let dot = printed.rfind('.')?;
        let slash = printed.rfind('/');
        match slash {
            Some(slash) if dot == slash + 1 => return None,
            None if dot == 0 => return None,
            _ => {}
        }

        self.exts.get(&printed[dot..]).map(|s| s.as_str())
    }

    /// Render `printed` wrapped in the color for `kind`/`perms`, or
    /// plain if no rule matches.
    pub fn paint(&self, printed: &str, kind: EntryType, perms: u32) -> String {
        self.paint_ls(printed, kind.into(), perms)
    }

    /// As [`Painter::paint`], but taking an [`LsType`] directly so
    /// callers can pass the synthetic `Orphan`/`Executable` kinds.
    pub fn paint_ls(&self, printed: &str, kind: LsType, perms: u32) -> String {
        match self.find_color(printed, kind, perms) {
            Some(code) => format!("\x1b[{code}m{printed}{}", self.reset),
            None => printed.to_string(),
        }
    }
}

//! WireGuard config text to UAPI directive translation
//!
//! Turns the usual `[Interface]` / `[Peer]` configuration format into the
//! `key=value` lines consumed by a userspace WireGuard engine. Translation is
//! total: unknown sections, unknown keys and malformed lines are dropped, and
//! the engine gets the final word on whether the result is valid.
use serde::Serialize;
use std::fmt;

/// Placeholder written in place of secret values by [`DirectiveList::redacted`]
const REDACTED: &str = "(hidden)";

/// Keys understood by the engine's configuration interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKey {
    PrivateKey,
    ListenPort,
    ReplacePeers,
    PublicKey,
    AllowedIp,
    Endpoint,
    PersistentKeepaliveInterval,
}

impl DirectiveKey {
    /// Wire name of the key
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectiveKey::PrivateKey => "private_key",
            DirectiveKey::ListenPort => "listen_port",
            DirectiveKey::ReplacePeers => "replace_peers",
            DirectiveKey::PublicKey => "public_key",
            DirectiveKey::AllowedIp => "allowed_ip",
            DirectiveKey::Endpoint => "endpoint",
            DirectiveKey::PersistentKeepaliveInterval => "persistent_keepalive_interval",
        }
    }

    fn is_secret(&self) -> bool {
        matches!(self, DirectiveKey::PrivateKey)
    }
}

/// A single `key=value` control-protocol line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Directive {
    pub key: DirectiveKey,
    pub value: String,
}

impl Directive {
    fn new(key: DirectiveKey, value: impl Into<String>) -> Self {
        Directive {
            key,
            value: value.into(),
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key.as_str(), self.value)
    }
}

/// Ordered directives, rendered newline-separated without a trailing newline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DirectiveList {
    directives: Vec<Directive>,
}

impl DirectiveList {
    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Directive> {
        self.directives.iter()
    }

    /// Copy with secret values masked, for logs and CLI output
    pub fn redacted(&self) -> DirectiveList {
        let directives = self
            .directives
            .iter()
            .map(|d| {
                if d.key.is_secret() {
                    Directive::new(d.key, REDACTED)
                } else {
                    d.clone()
                }
            })
            .collect();
        DirectiveList { directives }
    }

    fn push(&mut self, key: DirectiveKey, value: impl Into<String>) {
        self.directives.push(Directive::new(key, value));
    }
}

impl fmt::Display for DirectiveList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, directive) in self.directives.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", directive)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a DirectiveList {
    type Item = &'a Directive;
    type IntoIter = std::slice::Iter<'a, Directive>;

    fn into_iter(self) -> Self::IntoIter {
        self.directives.iter()
    }
}

/// Config section the parser is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Interface,
    Peer,
    Other,
}

impl Section {
    /// Section named by a `[...]` header line
    fn from_header(header: &str) -> Self {
        let name = header.trim_matches(|c| c == '[' || c == ']').to_lowercase();
        match name.as_str() {
            "interface" => Section::Interface,
            "peer" => Section::Peer,
            _ => Section::Other,
        }
    }
}

/// What a `key = value` line turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    PrivateKey,
    ListenPort,
    PublicKey,
    AllowedIps,
    Endpoint,
    PersistentKeepalive,
    Ignore,
}

impl Action {
    fn lookup(section: Section, key: &str) -> Self {
        match (section, key.to_lowercase().as_str()) {
            (Section::Interface, "privatekey") => Action::PrivateKey,
            (Section::Interface, "listenport") => Action::ListenPort,
            (Section::Peer, "publickey") => Action::PublicKey,
            (Section::Peer, "allowedips") => Action::AllowedIps,
            (Section::Peer, "endpoint") => Action::Endpoint,
            (Section::Peer, "persistentkeepalive") => Action::PersistentKeepalive,
            _ => Action::Ignore,
        }
    }
}

/// Translate a WireGuard config document into engine directives.
///
/// Directives come out in document order. `replace_peers=true` is emitted
/// once, right before the first `public_key`, so the engine drops any peers
/// left over from a previous configuration.
pub fn translate(doc: &str) -> DirectiveList {
    let mut out = DirectiveList::default();
    let mut section = Section::Other;
    let mut peers_replaced = false;

    for line in doc.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = Section::from_header(line);
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();

        match Action::lookup(section, key.trim()) {
            Action::PrivateKey => out.push(DirectiveKey::PrivateKey, value),
            Action::ListenPort => out.push(DirectiveKey::ListenPort, value),
            Action::PublicKey => {
                if !peers_replaced {
                    out.push(DirectiveKey::ReplacePeers, "true");
                    peers_replaced = true;
                }
                out.push(DirectiveKey::PublicKey, value);
            }
            Action::AllowedIps => {
                for ip in value.split(',').map(str::trim).filter(|ip| !ip.is_empty()) {
                    out.push(DirectiveKey::AllowedIp, ip);
                }
            }
            Action::Endpoint => out.push(DirectiveKey::Endpoint, value),
            Action::PersistentKeepalive => {
                out.push(DirectiveKey::PersistentKeepaliveInterval, value)
            }
            Action::Ignore => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = "[Interface]
PrivateKey = AAA
ListenPort = 51820
[Peer]
PublicKey = BBB
AllowedIPs = 0.0.0.0/0, ::/0
Endpoint = 1.2.3.4:51820
PersistentKeepalive = 25";

    #[test]
    fn translates_basic_config() {
        let expected = "private_key=AAA
listen_port=51820
replace_peers=true
public_key=BBB
allowed_ip=0.0.0.0/0
allowed_ip=::/0
endpoint=1.2.3.4:51820
persistent_keepalive_interval=25";

        assert_eq!(translate(BASIC).to_string(), expected);
    }

    #[test]
    fn replace_peers_only_before_first_public_key() {
        let doc = "[Interface]\nPrivateKey = k\n\
                   [Peer]\nPublicKey = p1\nAllowedIPs = 10.0.0.2/32\n\
                   [Peer]\nPublicKey = p2\nAllowedIPs = 10.0.0.3/32\n\
                   [Peer]\nPublicKey = p3\n";
        let out = translate(doc).to_string();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.iter().filter(|l| **l == "replace_peers=true").count(), 1);
        let replace = lines.iter().position(|l| *l == "replace_peers=true").unwrap();
        let first_key = lines.iter().position(|l| l.starts_with("public_key=")).unwrap();
        assert_eq!(replace + 1, first_key);
        assert_eq!(lines.iter().filter(|l| l.starts_with("public_key=")).count(), 3);
    }

    #[test]
    fn no_replace_peers_without_public_key() {
        let doc = "[Peer]\nAllowedIPs = 10.0.0.0/8\nEndpoint = host:1";
        assert_eq!(
            translate(doc).to_string(),
            "allowed_ip=10.0.0.0/8\nendpoint=host:1"
        );
    }

    #[test]
    fn keys_and_sections_are_case_insensitive() {
        let doc = "[INTERFACE]\nprivatekey=x\n[pEeR]\nPUBLICKEY = y\nendPoint= e:1";
        assert_eq!(
            translate(doc).to_string(),
            "private_key=x\nreplace_peers=true\npublic_key=y\nendpoint=e:1"
        );
    }

    #[test]
    fn value_splits_on_first_equals_only() {
        let doc = "[Interface]\nPrivateKey = yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk=";
        assert_eq!(
            translate(doc).to_string(),
            "private_key=yAnz5TF+lXXJte14tji3zlMNq+hd2rYUIgJBgB3fBmk="
        );
    }

    #[test]
    fn unknown_sections_keys_and_stray_lines_are_dropped() {
        let doc = "ListenPort = 1\n\
                   [Interface]\nAddress = 10.0.0.1/24\nDNS = 1.1.1.1\nnot a pair\nListenPort = 2\n\
                   [Extra]\nPrivateKey = nope\n\
                   [Peer]\nPresharedKey = psk\nPublicKey = p";
        assert_eq!(
            translate(doc).to_string(),
            "listen_port=2\nreplace_peers=true\npublic_key=p"
        );
    }

    #[test]
    fn peer_keys_outside_peer_section_are_dropped() {
        let doc = "[Interface]\nPublicKey = p\nEndpoint = e:1";
        assert!(translate(doc).is_empty());
    }

    #[test]
    fn allowed_ips_skip_empty_entries_and_stream_in_order() {
        let doc = "[Peer]\nAllowedIPs = 10.0.0.1/32,, 10.0.0.2/32 ,\n\
                   PublicKey = p\nAllowedIPs = fd00::/64";
        assert_eq!(
            translate(doc).to_string(),
            "allowed_ip=10.0.0.1/32\nallowed_ip=10.0.0.2/32\n\
             replace_peers=true\npublic_key=p\nallowed_ip=fd00::/64"
        );
    }

    #[test]
    fn crlf_and_indentation_are_tolerated() {
        let doc = "  [Interface]\r\n\tPrivateKey = a \r\n\r\n  [Peer]  \r\nPublicKey=b\r\n";
        assert_eq!(
            translate(doc).to_string(),
            "private_key=a\nreplace_peers=true\npublic_key=b"
        );
    }

    #[test]
    fn empty_and_blank_documents_translate_to_nothing() {
        assert!(translate("").is_empty());
        assert_eq!(translate("\n  \n\t").to_string(), "");
    }

    #[test]
    fn redacted_hides_private_key() {
        let list = translate(BASIC);
        let shown = list.redacted().to_string();
        assert!(shown.starts_with("private_key=(hidden)\nlisten_port=51820"));
        assert!(!shown.contains("AAA"));
        assert!(shown.contains("public_key=BBB"));
    }

    #[test]
    fn serializes_as_key_value_objects() {
        let list = translate("[Interface]\nListenPort = 7");
        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(json, r#"[{"key":"listen_port","value":"7"}]"#);
    }
}

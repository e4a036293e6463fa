//! Packet-filter rule model, `iptables` rendering, and rule-set parsing.
//!
//! Rules render exactly as `iptables -S` prints them so that a rule parsed
//! from the host compares equal to the rule the planner wants.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Built-in filter-table chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Chain {
    Input,
    Forward,
    Output,
}

impl Chain {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "INPUT" => Some(Self::Input),
            "FORWARD" => Some(Self::Forward),
            "OUTPUT" => Some(Self::Output),
            _ => None,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Input => "INPUT",
            Self::Forward => "FORWARD",
            Self::Output => "OUTPUT",
        })
    }
}

/// Default chain policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Policy {
    Accept,
    Drop,
}

impl Policy {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "ACCEPT" => Some(Self::Accept),
            "DROP" => Some(Self::Drop),
            _ => None,
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accept => "ACCEPT",
            Self::Drop => "DROP",
        })
    }
}

/// Connection-tracking state. Ordered the way `iptables -S` prints them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnState {
    Invalid,
    New,
    Related,
    Established,
    Untracked,
}

impl ConnState {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "INVALID" => Some(Self::Invalid),
            "NEW" => Some(Self::New),
            "RELATED" => Some(Self::Related),
            "ESTABLISHED" => Some(Self::Established),
            "UNTRACKED" => Some(Self::Untracked),
            _ => None,
        }
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Invalid => "INVALID",
            Self::New => "NEW",
            Self::Related => "RELATED",
            Self::Established => "ESTABLISHED",
            Self::Untracked => "UNTRACKED",
        })
    }
}

/// A single filter-table predicate: `(chain, target, match criteria)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FirewallRule {
    pub chain: Chain,
    /// Jump target, e.g. `ACCEPT`.
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dport: Option<u16>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub ctstate: BTreeSet<ConnState>,
    /// Options this model does not interpret, kept verbatim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<String>,
}

impl FirewallRule {
    fn accept(chain: Chain) -> Self {
        Self {
            chain,
            target: "ACCEPT".to_string(),
            in_interface: None,
            out_interface: None,
            protocol: None,
            dport: None,
            ctstate: BTreeSet::new(),
            extra: Vec::new(),
        }
    }

    #[must_use]
    pub fn loopback_in() -> Self {
        Self {
            in_interface: Some("lo".to_string()),
            ..Self::accept(Chain::Input)
        }
    }

    #[must_use]
    pub fn loopback_out() -> Self {
        Self {
            out_interface: Some("lo".to_string()),
            ..Self::accept(Chain::Output)
        }
    }

    #[must_use]
    pub fn established_in() -> Self {
        Self {
            ctstate: [ConnState::Related, ConnState::Established].into_iter().collect(),
            ..Self::accept(Chain::Input)
        }
    }

    /// Inbound TCP to `port` from anywhere.
    #[must_use]
    pub fn allow_tcp_in(port: u16) -> Self {
        Self {
            protocol: Some("tcp".to_string()),
            dport: Some(port),
            ..Self::accept(Chain::Input)
        }
    }

    /// Whether this rule unconditionally accepts new inbound TCP on `port`.
    #[must_use]
    pub fn allows_tcp_in(&self, port: u16) -> bool {
        self.chain == Chain::Input
            && self.target == "ACCEPT"
            && self.protocol.as_deref() == Some("tcp")
            && self.dport == Some(port)
            && self.in_interface.is_none()
            && self.ctstate.is_empty()
            && self.extra.is_empty()
    }

    /// Match and jump arguments, without the chain.
    #[must_use]
    pub fn spec_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(iface) = &self.in_interface {
            args.extend(["-i".to_string(), iface.clone()]);
        }
        if let Some(iface) = &self.out_interface {
            args.extend(["-o".to_string(), iface.clone()]);
        }
        if let Some(proto) = &self.protocol {
            args.extend(["-p".to_string(), proto.clone()]);
            if self.dport.is_some() {
                args.extend(["-m".to_string(), proto.clone()]);
            }
        }
        if let Some(port) = self.dport {
            args.extend(["--dport".to_string(), port.to_string()]);
        }
        if !self.ctstate.is_empty() {
            let states: Vec<String> = self.ctstate.iter().map(ToString::to_string).collect();
            args.extend([
                "-m".to_string(),
                "conntrack".to_string(),
                "--ctstate".to_string(),
                states.join(","),
            ]);
        }
        args.extend(self.extra.iter().cloned());
        args.extend(["-j".to_string(), self.target.clone()]);
        args
    }

    /// `iptables -A <chain> ...` argument vector.
    #[must_use]
    pub fn append_command(&self) -> Vec<String> {
        let mut argv = vec!["iptables".to_string(), "-A".to_string(), self.chain.to_string()];
        argv.extend(self.spec_args());
        argv
    }

    /// Parses one `-A <chain> ...` line from `iptables -S` or `iptables-save`.
    ///
    /// Returns `None` for lines that are not appends to a built-in chain.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        if tokens.next()? != "-A" {
            return None;
        }
        let chain = Chain::parse(tokens.next()?)?;
        let mut rule = Self {
            target: String::new(),
            ..Self::accept(chain)
        };

        while let Some(token) = tokens.next() {
            match token {
                "-i" => rule.in_interface = tokens.next().map(str::to_string),
                "-o" => rule.out_interface = tokens.next().map(str::to_string),
                "-p" => rule.protocol = tokens.next().map(str::to_string),
                "-m" => match tokens.next() {
                    Some("tcp" | "udp" | "conntrack" | "state") => {}
                    Some(other) => rule.extra.extend(["-m".to_string(), other.to_string()]),
                    None => {}
                },
                "--dport" => rule.dport = tokens.next().and_then(|p| p.parse().ok()),
                "--ctstate" | "--state" => {
                    if let Some(states) = tokens.next() {
                        rule.ctstate = states.split(',').filter_map(ConnState::parse).collect();
                    }
                }
                "-j" => rule.target = tokens.next().unwrap_or_default().to_string(),
                other => rule.extra.push(other.to_string()),
            }
        }
        (!rule.target.is_empty()).then_some(rule)
    }
}

impl fmt::Display for FirewallRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-A {} {}", self.chain, self.spec_args().join(" "))
    }
}

/// The filter table: chain policies plus the ordered rule list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub policies: BTreeMap<Chain, Policy>,
    #[serde(default)]
    pub rules: Vec<FirewallRule>,
}

impl RuleSet {
    /// Parses `iptables -S` output or an `iptables-save` file.
    ///
    /// For `iptables-save` input only the `*filter` table is read.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut set = Self::default();
        let mut table: Option<&str> = None;
        for line in text.lines().map(str::trim) {
            if let Some(name) = line.strip_prefix('*') {
                table = Some(name);
                continue;
            }
            if table.is_some_and(|t| t != "filter") {
                continue;
            }
            if let Some(rest) = line.strip_prefix(':').or_else(|| line.strip_prefix("-P ")) {
                if let Some((chain, policy)) = parse_policy(rest) {
                    set.policies.insert(chain, policy);
                }
            } else if let Some(rule) = FirewallRule::parse(line) {
                set.rules.push(rule);
            }
        }
        set
    }

    /// Policy of `chain`; the kernel default is ACCEPT.
    #[must_use]
    pub fn policy(&self, chain: Chain) -> Policy {
        self.policies.get(&chain).copied().unwrap_or(Policy::Accept)
    }

    #[must_use]
    pub fn contains(&self, rule: &FirewallRule) -> bool {
        self.rules.contains(rule)
    }

    /// Whether some rule accepts inbound TCP on `port`.
    #[must_use]
    pub fn allows_tcp_in(&self, port: u16) -> bool {
        self.rules.iter().any(|r| r.allows_tcp_in(port))
    }

    pub fn append(&mut self, rule: FirewallRule) {
        self.rules.push(rule);
    }

    pub fn set_policy(&mut self, chain: Chain, policy: Policy) {
        self.policies.insert(chain, policy);
    }

    /// Compares policies and rules, treating an unset policy as ACCEPT.
    #[must_use]
    pub fn equivalent(&self, other: &Self) -> bool {
        [Chain::Input, Chain::Forward, Chain::Output]
            .iter()
            .all(|c| self.policy(*c) == other.policy(*c))
            && self.rules == other.rules
    }
}

/// Parses `<CHAIN> <POLICY>` from a `-P` or `:` line.
fn parse_policy(rest: &str) -> Option<(Chain, Policy)> {
    let mut parts = rest.split_whitespace();
    let chain = Chain::parse(parts.next()?)?;
    let policy = Policy::parse(parts.next()?)?;
    Some((chain, policy))
}

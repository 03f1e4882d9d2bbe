//! Per-run state handed to rules.
//!
//! A [`RunContext`] is built once per analysis run from the resolved
//! settings. Each rule invocation receives a [`RuleContext`] view of it that
//! exposes only that rule's own arguments.

use crate::rule::RuleDescriptor;
use crate::value::{LiteralValue, NameMap};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

static NO_ARGUMENTS: NameMap<LiteralValue> = NameMap::new();

/// Cooperative cancellation flag, checked between rule invocations.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Command aliases and the commands they stand for.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    /// Lowercased alias to command name
    aliases: HashMap<String, String>,
}

/// Aliases defined by a default PowerShell session.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("%", "ForEach-Object"),
    ("?", "Where-Object"),
    ("ac", "Add-Content"),
    ("cat", "Get-Content"),
    ("cd", "Set-Location"),
    ("chdir", "Set-Location"),
    ("clc", "Clear-Content"),
    ("clear", "Clear-Host"),
    ("cls", "Clear-Host"),
    ("clv", "Clear-Variable"),
    ("compare", "Compare-Object"),
    ("copy", "Copy-Item"),
    ("cp", "Copy-Item"),
    ("cpi", "Copy-Item"),
    ("cvpa", "Convert-Path"),
    ("del", "Remove-Item"),
    ("diff", "Compare-Object"),
    ("dir", "Get-ChildItem"),
    ("echo", "Write-Output"),
    ("epal", "Export-Alias"),
    ("erase", "Remove-Item"),
    ("fl", "Format-List"),
    ("foreach", "ForEach-Object"),
    ("ft", "Format-Table"),
    ("fw", "Format-Wide"),
    ("gal", "Get-Alias"),
    ("gc", "Get-Content"),
    ("gci", "Get-ChildItem"),
    ("gcm", "Get-Command"),
    ("ghy", "Get-History"),
    ("gi", "Get-Item"),
    ("gl", "Get-Location"),
    ("gm", "Get-Member"),
    ("gmo", "Get-Module"),
    ("gp", "Get-ItemProperty"),
    ("gps", "Get-Process"),
    ("group", "Group-Object"),
    ("gsv", "Get-Service"),
    ("gu", "Get-Unique"),
    ("gv", "Get-Variable"),
    ("h", "Get-History"),
    ("history", "Get-History"),
    ("icm", "Invoke-Command"),
    ("iex", "Invoke-Expression"),
    ("ii", "Invoke-Item"),
    ("ipal", "Import-Alias"),
    ("ipmo", "Import-Module"),
    ("irm", "Invoke-RestMethod"),
    ("iwr", "Invoke-WebRequest"),
    ("kill", "Stop-Process"),
    ("ls", "Get-ChildItem"),
    ("measure", "Measure-Object"),
    ("mi", "Move-Item"),
    ("move", "Move-Item"),
    ("mv", "Move-Item"),
    ("nal", "New-Alias"),
    ("ni", "New-Item"),
    ("oh", "Out-Host"),
    ("popd", "Pop-Location"),
    ("ps", "Get-Process"),
    ("pushd", "Push-Location"),
    ("pwd", "Get-Location"),
    ("r", "Invoke-History"),
    ("rd", "Remove-Item"),
    ("ren", "Rename-Item"),
    ("ri", "Remove-Item"),
    ("rm", "Remove-Item"),
    ("rmdir", "Remove-Item"),
    ("rni", "Rename-Item"),
    ("rv", "Remove-Variable"),
    ("rvpa", "Resolve-Path"),
    ("sal", "Set-Alias"),
    ("saps", "Start-Process"),
    ("select", "Select-Object"),
    ("set", "Set-Variable"),
    ("si", "Set-Item"),
    ("sl", "Set-Location"),
    ("sleep", "Start-Sleep"),
    ("sort", "Sort-Object"),
    ("sp", "Set-ItemProperty"),
    ("spps", "Stop-Process"),
    ("start", "Start-Process"),
    ("sv", "Set-Variable"),
    ("tee", "Tee-Object"),
    ("type", "Get-Content"),
    ("where", "Where-Object"),
    ("write", "Write-Output"),
];

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The aliases of a default PowerShell session.
    pub fn builtin() -> Self {
        BUILTIN_ALIASES
            .iter()
            .map(|(alias, command)| (*alias, *command))
            .collect()
    }

    pub fn insert(&mut self, alias: &str, command: &str) {
        self.aliases
            .insert(alias.to_lowercase(), command.to_string());
    }

    /// The command `name` stands for, if it is an alias.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.aliases.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for AliasTable {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (alias, command) in iter {
            table.insert(alias, command);
        }
        table
    }
}

/// State shared by every rule during one analysis run.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    aliases: Arc<AliasTable>,
    arguments: Arc<NameMap<NameMap<LiteralValue>>>,
    cancellation: CancellationToken,
}

impl RunContext {
    pub fn new(
        aliases: AliasTable,
        arguments: NameMap<NameMap<LiteralValue>>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            aliases: Arc::new(aliases),
            arguments: Arc::new(arguments),
            cancellation,
        }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Arguments for every rule, keyed by rule name.
    pub fn arguments(&self) -> &NameMap<NameMap<LiteralValue>> {
        &self.arguments
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// The arguments configured for one rule, looked up by simple or
    /// namespaced name.
    pub fn arguments_for(&self, descriptor: &RuleDescriptor) -> RuleArguments<'_> {
        let map = self
            .arguments
            .iter()
            .find(|(name, _)| descriptor.matches_name(name))
            .map(|(_, map)| map)
            .unwrap_or(&NO_ARGUMENTS);
        RuleArguments { map }
    }

    /// The view handed to a single rule invocation.
    pub fn for_rule(&self, descriptor: &RuleDescriptor) -> RuleContext<'_> {
        RuleContext {
            aliases: &self.aliases,
            arguments: self.arguments_for(descriptor),
            cancellation: &self.cancellation,
        }
    }
}

/// What a rule sees while it runs.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    aliases: &'a AliasTable,
    arguments: RuleArguments<'a>,
    cancellation: &'a CancellationToken,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        aliases: &'a AliasTable,
        arguments: &'a NameMap<LiteralValue>,
        cancellation: &'a CancellationToken,
    ) -> Self {
        Self {
            aliases,
            arguments: RuleArguments { map: arguments },
            cancellation,
        }
    }

    pub fn aliases(&self) -> &'a AliasTable {
        self.aliases
    }

    pub fn arguments(&self) -> RuleArguments<'a> {
        self.arguments
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// One rule's argument map.
#[derive(Debug, Clone, Copy)]
pub struct RuleArguments<'a> {
    map: &'a NameMap<LiteralValue>,
}

impl<'a> RuleArguments<'a> {
    pub fn get(&self, key: &str) -> Option<&'a LiteralValue> {
        self.map.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(LiteralValue::as_bool)
    }

    /// A string or string array argument; absent or mis-shaped values give an empty list.
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(LiteralValue::as_string_list)
            .unwrap_or_default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a str> {
        self.map.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn as_map(&self) -> &'a NameMap<LiteralValue> {
        self.map
    }

    /// `false` only when `Enable = $false` is configured.
    pub fn is_enabled(&self) -> bool {
        self.get_bool("Enable").unwrap_or(true)
    }
}

mod avoid_cmdlet_aliases;

pub use avoid_cmdlet_aliases::AvoidUsingCmdletAliases;

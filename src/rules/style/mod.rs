mod avoid_double_quotes;
mod avoid_trailing_whitespace;

pub use avoid_double_quotes::AvoidUsingDoubleQuotesForConstantString;
pub use avoid_trailing_whitespace::AvoidTrailingWhitespace;

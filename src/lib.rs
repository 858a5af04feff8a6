pub mod check;
pub mod config;
pub mod errors;
pub mod mirror;
pub mod poller;
pub mod source;

#[cfg(test)]
mod test_support;

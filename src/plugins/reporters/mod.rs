pub mod channel;
pub mod console;
pub mod discord;

pub use channel::ChannelReporter;
pub use console::ConsoleReporter;
pub use discord::DiscordReporter;

pub mod linker;
pub mod providers;
pub mod types;

pub use linker::{ServiceLinker, ensure_fresh};
pub use providers::{FigmaProvider, GithubProvider, ServiceProvider, SlackProvider};
pub use types::{CallbackQuery, RemoteAccount, RemoteTeam, TokenSet};

pub mod history;
pub mod identity;
pub mod locator;
pub mod porcelain;
pub mod provenance;
pub mod runner;

pub use history::FileHistory;
pub use identity::IdentityResolver;
pub use locator::RepoLocator;
pub use porcelain::{CommitMetadata, ParsedBlame, parse_line_porcelain};
pub use provenance::ProvenanceEnricher;
pub use runner::{GitCommand, GitRunner, ProcessRunner, categorize_error, check_git_availability};

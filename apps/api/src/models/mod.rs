pub mod profile;
pub mod result;
pub mod settings;

pub use profile::UserProfile;
pub use result::RecentResult;
pub use settings::ProviderSettings;

mod driver;
mod state;
mod validate;

pub use driver::Wizard;
pub use state::{GrantContext, OutputOptions, RfpContext, SourceFile, WizardAction, WizardState};
pub use validate::{InputLimits, check_submit, validate_file, validate_url};

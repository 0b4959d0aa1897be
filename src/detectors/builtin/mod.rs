//! Built-in detectors, one per vulnerability family.

mod authorization;
mod business_logic;
mod credentials;
mod injection;
mod privilege;
mod tenancy;
mod token_handling;

pub use authorization::MissingAuthorizationDetector;
pub use business_logic::BusinessLogicDetector;
pub use credentials::HardcodedCredentialsDetector;
pub use injection::InjectionDetector;
pub use privilege::PrivilegeEscalationDetector;
pub use tenancy::TenantIsolationDetector;
pub use token_handling::TokenHandlingDetector;

use super::Detector;

/// All built-in detectors in registration order.
pub fn all_detectors() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(HardcodedCredentialsDetector),
        Box::new(TokenHandlingDetector),
        Box::new(MissingAuthorizationDetector),
        Box::new(PrivilegeEscalationDetector),
        Box::new(TenantIsolationDetector),
        Box::new(InjectionDetector),
        Box::new(BusinessLogicDetector),
    ]
}

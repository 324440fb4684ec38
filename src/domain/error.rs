use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("`{value}` is not a valid {component}")]
    InvalidDateComponent {
        component: &'static str,
        value: String,
    },
    #[error("{year:04}-{month:02}-{day:02} is not a calendar date")]
    InvalidDate { year: i32, month: u8, day: u8 },
}

impl DomainError {
    pub fn invalid_component(component: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidDateComponent {
            component,
            value: value.into(),
        }
    }
}

use shared::domain::FieldValues;

/// Maps the current field values to the subset that needs correcting.
///
/// Implementations must be pure and idempotent: sanitizing already
/// sanitized values yields no corrections.
pub trait Sanitizer: Send + Sync {
    fn sanitize(&self, fields: &FieldValues) -> FieldValues;
}

impl<F> Sanitizer for F
where
    F: Fn(&FieldValues) -> FieldValues + Send + Sync,
{
    fn sanitize(&self, fields: &FieldValues) -> FieldValues {
        (self)(fields)
    }
}

pub struct NoopSanitizer;

impl Sanitizer for NoopSanitizer {
    fn sanitize(&self, _fields: &FieldValues) -> FieldValues {
        FieldValues::new()
    }
}

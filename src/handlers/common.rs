use crate::errors::ServiceError;
use uuid::Uuid;

/// Parses a path id; anything that is not a UUID cannot name an order.
pub fn parse_order_id(raw: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ServiceError::NotFound(format!("Order with ID {} not found", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_ids_are_not_found() {
        assert!(matches!(
            parse_order_id("not-a-uuid"),
            Err(ServiceError::NotFound(_))
        ));
        let id = Uuid::new_v4();
        assert_eq!(parse_order_id(&id.to_string()).unwrap(), id);
    }
}

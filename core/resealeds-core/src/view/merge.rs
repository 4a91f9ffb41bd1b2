//! Merges store-confirmed records into the ordered local list.

use resealeds_protocol::MonitoredProduct;
use serde::Serialize;

use crate::config::DuplicatePolicy;
use crate::error::MergeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    Inserted { index: usize },
    Replaced { index: usize },
}

/// Inserts `product` at the position its id dictates.
///
/// `products` must already be strictly ascending by id; the result is too.
/// The store may hand out ids out of band of local expectations, so the
/// record is never appended blindly.
pub fn merge_confirmed(
    products: &mut Vec<MonitoredProduct>,
    product: MonitoredProduct,
    policy: DuplicatePolicy,
) -> Result<MergeOutcome, MergeError> {
    match products.binary_search_by_key(&product.id, |existing| existing.id) {
        Ok(index) => match policy {
            DuplicatePolicy::Reject => Err(MergeError::DuplicateId(product.id)),
            DuplicatePolicy::Overwrite => {
                products[index] = product;
                Ok(MergeOutcome::Replaced { index })
            }
        },
        Err(index) => {
            products.insert(index, product);
            Ok(MergeOutcome::Inserted { index })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resealeds_protocol::ProductId;

    fn product(id: i64) -> MonitoredProduct {
        MonitoredProduct {
            id: ProductId::new(id).unwrap(),
            name: format!("product-{}", id),
            img: format!("/img/{}.png", id),
            price: id as f64,
        }
    }

    fn ids(products: &[MonitoredProduct]) -> Vec<i64> {
        products.iter().map(|p| p.id.get()).collect()
    }

    #[test]
    fn inserts_between_neighbours() {
        let mut products = vec![product(1), product(3)];
        let outcome = merge_confirmed(&mut products, product(2), DuplicatePolicy::Reject);
        assert_eq!(outcome, Ok(MergeOutcome::Inserted { index: 1 }));
        assert_eq!(ids(&products), vec![1, 2, 3]);
    }

    #[test]
    fn inserts_at_front_and_back() {
        let mut products = vec![product(5)];
        merge_confirmed(&mut products, product(9), DuplicatePolicy::Reject).unwrap();
        merge_confirmed(&mut products, product(2), DuplicatePolicy::Reject).unwrap();
        assert_eq!(ids(&products), vec![2, 5, 9]);
    }

    #[test]
    fn inserts_into_empty_list() {
        let mut products = Vec::new();
        let outcome = merge_confirmed(&mut products, product(4), DuplicatePolicy::Reject);
        assert_eq!(outcome, Ok(MergeOutcome::Inserted { index: 0 }));
    }

    #[test]
    fn reject_policy_refuses_duplicate() {
        let mut products = vec![product(1), product(2)];
        let mut renamed = product(2);
        renamed.name = "renamed".to_string();

        let outcome = merge_confirmed(&mut products, renamed, DuplicatePolicy::Reject);
        assert_eq!(
            outcome,
            Err(MergeError::DuplicateId(ProductId::new(2).unwrap()))
        );
        assert_eq!(products[1].name, "product-2");
    }

    #[test]
    fn overwrite_policy_replaces_in_place() {
        let mut products = vec![product(1), product(2), product(3)];
        let mut renamed = product(2);
        renamed.name = "renamed".to_string();

        let outcome = merge_confirmed(&mut products, renamed, DuplicatePolicy::Overwrite);
        assert_eq!(outcome, Ok(MergeOutcome::Replaced { index: 1 }));
        assert_eq!(ids(&products), vec![1, 2, 3]);
        assert_eq!(products[1].name, "renamed");
    }
}

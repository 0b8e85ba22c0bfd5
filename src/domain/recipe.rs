use super::entities::{Ingredient, IngredientPrices, ItemId};

/// Aggregated crafting cost of a recipe.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecipeCost {
    pub total: f64,
    /// Ingredients with no known price; they count as 0 and underestimate `total`.
    pub missing: Vec<ItemId>,
    /// Ingredients flagged unavailable (negative price) on this server.
    pub unavailable: Vec<ItemId>,
}

impl RecipeCost {
    pub fn is_craftable(&self) -> bool {
        self.unavailable.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

pub fn recipe_cost(recipe: &[Ingredient], prices: &IngredientPrices) -> RecipeCost {
    let mut cost = RecipeCost::default();

    for ingredient in recipe {
        match prices.get(&ingredient.id).map(|entry| entry.price) {
            Some(price) if price < 0.0 => cost.unavailable.push(ingredient.id),
            Some(price) => cost.total += price * ingredient.quantity as f64,
            None => cost.missing.push(ingredient.id),
        }
    }

    cost
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::IngredientPrice;

    fn ingredient(id: ItemId, quantity: u32) -> Ingredient {
        Ingredient {
            id,
            name: format!("ingredient-{id}"),
            img: String::new(),
            quantity,
        }
    }

    fn priced(entries: &[(ItemId, f64)]) -> IngredientPrices {
        entries
            .iter()
            .map(|(id, price)| {
                (
                    *id,
                    IngredientPrice {
                        price: *price,
                        updated_at: None,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn sums_quantity_times_price() {
        let recipe = vec![ingredient(1, 3), ingredient(2, 10)];
        let cost = recipe_cost(&recipe, &priced(&[(1, 1500.0), (2, 40.0)]));
        assert_eq!(cost.total, 4900.0);
        assert!(cost.is_complete());
        assert!(cost.is_craftable());
    }

    #[test]
    fn reports_missing_and_unavailable() {
        let recipe = vec![ingredient(1, 1), ingredient(2, 2), ingredient(3, 4)];
        let cost = recipe_cost(&recipe, &priced(&[(1, 100.0), (3, -1.0)]));
        assert_eq!(cost.total, 100.0);
        assert_eq!(cost.missing, vec![2]);
        assert_eq!(cost.unavailable, vec![3]);
        assert!(!cost.is_craftable());
    }

    #[test]
    fn empty_recipe_costs_nothing() {
        assert_eq!(recipe_cost(&[], &IngredientPrices::new()), RecipeCost::default());
    }
}

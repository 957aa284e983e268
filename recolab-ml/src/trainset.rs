//! Indexed view of the training interactions.
//!
//! Raw ids are mapped onto dense inner indices (first-seen order) so models
//! can keep their parameters in contiguous arrays.

use recolab_core::{Interaction, ProductId, RatingScale, RecolabError, Result, UserId};
use std::collections::{HashMap, HashSet};

/// Training data with dense user/product indices and the global mean rating.
#[derive(Debug, Clone)]
pub struct Trainset {
    scale: RatingScale,
    user_index: HashMap<UserId, usize>,
    product_index: HashMap<ProductId, usize>,
    users: Vec<UserId>,
    products: Vec<ProductId>,
    user_ratings: Vec<Vec<(usize, f64)>>,
    ratings: Vec<(usize, usize, f64)>,
    global_mean: f64,
}

impl Trainset {
    pub fn build(records: &[Interaction], scale: RatingScale) -> Result<Self> {
        if records.is_empty() {
            return Err(RecolabError::empty_dataset(
                "cannot build a trainset without ratings",
            ));
        }

        let mut user_index = HashMap::new();
        let mut product_index = HashMap::new();
        let mut users = Vec::new();
        let mut products = Vec::new();
        let mut user_ratings: Vec<Vec<(usize, f64)>> = Vec::new();
        let mut ratings = Vec::with_capacity(records.len());
        let mut total = 0.0;

        for rec in records {
            let u = *user_index.entry(rec.user_id).or_insert_with(|| {
                users.push(rec.user_id);
                user_ratings.push(Vec::new());
                users.len() - 1
            });
            let i = *product_index.entry(rec.product_id).or_insert_with(|| {
                products.push(rec.product_id);
                products.len() - 1
            });
            user_ratings[u].push((i, rec.rating));
            ratings.push((u, i, rec.rating));
            total += rec.rating;
        }

        let global_mean = total / ratings.len() as f64;
        Ok(Self {
            scale,
            user_index,
            product_index,
            users,
            products,
            user_ratings,
            ratings,
            global_mean,
        })
    }

    pub fn rating_scale(&self) -> RatingScale {
        self.scale
    }

    pub fn n_users(&self) -> usize {
        self.users.len()
    }

    pub fn n_products(&self) -> usize {
        self.products.len()
    }

    pub fn n_ratings(&self) -> usize {
        self.ratings.len()
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    /// Every rating as `(inner_user, inner_product, rating)`, in insertion order.
    pub fn all_ratings(&self) -> &[(usize, usize, f64)] {
        &self.ratings
    }

    pub fn to_inner_user(&self, user: UserId) -> Option<usize> {
        self.user_index.get(&user).copied()
    }

    pub fn to_inner_product(&self, product: ProductId) -> Option<usize> {
        self.product_index.get(&product).copied()
    }

    pub fn to_raw_user(&self, inner: usize) -> Option<UserId> {
        self.users.get(inner).copied()
    }

    pub fn to_raw_product(&self, inner: usize) -> Option<ProductId> {
        self.products.get(inner).copied()
    }

    pub fn knows_user(&self, user: UserId) -> bool {
        self.user_index.contains_key(&user)
    }

    pub fn knows_product(&self, product: ProductId) -> bool {
        self.product_index.contains_key(&product)
    }

    pub fn user_index(&self) -> &HashMap<UserId, usize> {
        &self.user_index
    }

    pub fn product_index(&self) -> &HashMap<ProductId, usize> {
        &self.product_index
    }

    /// Ratings given by an inner user as `(inner_product, rating)`.
    pub fn ratings_of(&self, inner_user: usize) -> &[(usize, f64)] {
        self.user_ratings
            .get(inner_user)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Products seen in training that `user` has not rated, sorted by id.
    pub fn anti_testset_for(&self, user: UserId) -> Result<Vec<ProductId>> {
        let inner = self.to_inner_user(user).ok_or_else(|| {
            RecolabError::invalid_input(format!("user {user} is not in the trainset"))
        })?;
        let rated: HashSet<usize> = self.ratings_of(inner).iter().map(|&(i, _)| i).collect();
        let mut unrated: Vec<ProductId> = self
            .products
            .iter()
            .enumerate()
            .filter(|(i, _)| !rated.contains(i))
            .map(|(_, &p)| p)
            .collect();
        unrated.sort_unstable();
        Ok(unrated)
    }
}

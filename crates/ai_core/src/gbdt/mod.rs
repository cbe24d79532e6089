//! Gradient Boosted Decision Tree classifier
//!
//! - `tree`: node layout, traversal and structural validation
//! - `model`: ensemble margin, logistic probability, gain importances
//! - `shap`: exact path-dependent TreeSHAP over node cover
//!
//! # Model Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "bias": -1.02,
//!   "feature_count": 2,
//!   "trees": [
//!     {
//!       "weight": 1.0,
//!       "nodes": [
//!         {"id":0,"left":1,"right":2,"feature_idx":1,"threshold":70.5,"leaf":null,"cover":1409.0,"gain":88.1},
//!         {"id":1,"left":-1,"right":-1,"feature_idx":-1,"threshold":0.0,"leaf":-0.08,"cover":790.2,"gain":0.0},
//!         {"id":2,"left":-1,"right":-1,"feature_idx":-1,"threshold":0.0,"leaf":0.11,"cover":618.8,"gain":0.0}
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! # Usage
//!
//! ```rust
//! use churnlens_ai_core::gbdt::{GbdtModel, Node, Tree};
//!
//! let tree = Tree::new(
//!     vec![
//!         Node::internal(0, 0, 0.5, 1, 2).with_stats(10.0, 2.0),
//!         Node::leaf(1, -1.0).with_stats(6.0, 0.0),
//!         Node::leaf(2, 1.0).with_stats(4.0, 0.0),
//!     ],
//!     1.0,
//! );
//! let model = GbdtModel::new(vec![tree], 0.0, 1);
//!
//! let p = model.predict_proba(&[1.0]);
//! let phi = model.shap_values(&[1.0]).unwrap();
//! assert!(p > 0.5);
//! assert!(phi[0] > 0.0);
//! ```

pub mod model;
pub mod shap;
pub mod tree;

pub use model::{GbdtModel, FORMAT_VERSION};
pub use shap::ShapError;
pub use tree::{Node, Tree};

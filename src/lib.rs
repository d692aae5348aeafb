//! Online FDR and FWER control for streams of hypothesis tests.
//!
//! This library computes adaptive significance thresholds for an ordered
//! stream of p-values arriving sequentially or in batches, controlling the
//! false discovery rate (FDR), false discovery exceedance (FDX), or
//! familywise error rate (FWER) without knowledge of future data. Each
//! procedure makes one forward pass: for every p-value it emits a
//! threshold and a reject/accept decision that depends only on earlier
//! decisions.
//!
//! # Overview
//!
//! The procedures are organized by what drives their budget updates:
//!
//! - **lond**: LOND, thresholds scaled by the discovery count (FDR)
//! - **lord**: the LORD family — LORD++, LORD 3, D-LORD, dep (FDR)
//! - **saffron**: SAFFRON, Alpha-investing, ADDIS — adaptive,
//!   candidate-based rules (FDR)
//! - **star**: LONDstar, LORDstar, SAFFRONstar — asynchronous, lagged, or
//!   batched testing processes (FDR/mFDR)
//! - **spend**: Alpha-spending, online fallback, ADDIS-spending (FWER)
//! - **suplord**: supLORD, exceedance control of the FDP (FDX)
//! - **weights**: the default gamma/beta/xi weighting sequences
//! - **result**: the per-run output container
//!
//! # Example
//!
//! ```
//! use online_fdr::prelude::*;
//!
//! let pvals = [1e-7, 3e-4, 0.1, 5e-4];
//! let results = Lond::new(0.05).run(&pvals).unwrap();
//! assert_eq!(results.decisions(), vec![1, 1, 0, 1]);
//!
//! // The same stream tested asynchronously, nothing finishing before t = 4.
//! let star = LondStar::new(0.05, Topology::Async(vec![4, 4, 4, 4]));
//! assert_eq!(star.run(&pvals).unwrap().decisions(), vec![1, 1, 0, 0]);
//! ```

pub mod error;
pub mod lond;
pub mod lord;
pub mod result;
pub mod saffron;
pub mod spend;
pub mod star;
pub mod suplord;
pub mod weights;

/// Convenient re-exports of the procedure types and their shared surface.
pub mod prelude {
    pub use crate::error::{FdrError, Result};
    pub use crate::lond::Lond;
    pub use crate::lord::{Lord, LordVersion};
    pub use crate::result::TestResults;
    pub use crate::saffron::{Addis, AlphaInvesting, Saffron};
    pub use crate::spend::{AddisSpending, AlphaSpending, OnlineFallback};
    pub use crate::star::{LondStar, LordStar, SaffronStar, Topology};
    pub use crate::suplord::SupLord;
}

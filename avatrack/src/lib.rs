//! Person identity stitching for AVA-style action datasets
//!
//! This crate provides the in-memory algorithms behind dataset preparation:
//! - [`BoxMatcher`]: transfers tracker identities onto action-labelled boxes
//!   from an independent detection run
//! - [`IdentityPropagator`]: mints video-scoped identities for the boxes left
//!   unresolved and carries them forward across nearby frames
//! - [`AgreementScorer`]: spatial/temporal IoU and inter-annotator agreement
//!
//! ```rust,ignore
//! use avatrack::{BoxMatcher, IdentityPropagator};
//!
//! let outcome = BoxMatcher::match_records(&with_identity, &without_identity);
//! let mut records = outcome.records;
//! let stats = IdentityPropagator::sort_and_run(&mut records)?;
//! ```

pub mod agreement;
pub mod bbox;
pub mod error;
pub mod matching;
pub mod propagation;
pub mod records;

pub use agreement::{
    batch_spatial_iou, problematic_samples, spatial_iou, temporal_iou, AgreementConfig,
    AgreementReport, AgreementSample, AgreementScorer, Interval, ReviewSample,
};
pub use bbox::Bbox;
pub use error::{Result, StitchError};
pub use matching::{BoxMatcher, MatchOutcome, IDENTITY_SOURCE_OFFSET, MATCH_TOLERANCE};
pub use propagation::{
    check_order, sort_records, IdentityPropagator, PropagationStats, LOOKAHEAD_WINDOW,
    MAX_FRAME_GAP,
};
pub use records::{AnnotationRecord, Detection, MatchedRecord, UNRESOLVED_ID};

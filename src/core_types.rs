//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// Economy ID - globally unique identifier for an economy.
///
/// # Constraints:
/// - **Immutable**: Once assigned, NEVER changes
/// - **External**: Assigned by the hosting platform (one economy per
///   server), never minted by this service
pub type EconomyId = u64;

/// User ID - globally unique, immutable after assignment.
///
/// # Usage:
/// - Identifies the acting user of a transfer
/// - Part of the resource key for balance serialization
pub type UserId = u64;

/// Officer ID - a [`UserId`] that has been granted decision authority.
pub type OfficerId = u64;

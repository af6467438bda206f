//! Invoice number generation.
//!
//! An invoice number is built from two random `u32` values `a` and `b`:
//! the decimal sum `a + b` (computed without overflow), followed by the
//! first five characters of `a` in decimal.
//!
//! Numbers are treated as unique per draft. Collisions are not detected here;
//! the `sales.invoice_no` UNIQUE constraint is the backstop.

/// Builds an invoice number from its two random halves.
///
/// ```rust
/// use despos_core::invoice::invoice_number_from;
///
/// assert_eq!(invoice_number_from(1_234_567, 89), "123465612345");
/// assert_eq!(invoice_number_from(42, 8), "5042");
/// ```
pub fn invoice_number_from(a: u32, b: u32) -> String {
    let sum = u64::from(a) + u64::from(b);
    let prefix: String = a.to_string().chars().take(5).collect();
    format!("{}{}", sum, prefix)
}

/// Generates a fresh invoice number from the thread-local RNG.
pub fn generate_invoice_no() -> String {
    invoice_number_from(rand::random::<u32>(), rand::random::<u32>())
}

//! Transaction fee model.

/// Fee for a transaction of the given shape.
///
/// Weight is `4·outputs + kernels − inputs`, floored at 1, so spending many
/// small outputs is cheap and creating outputs is expensive.
///
/// # Examples
///
/// ```
/// use beryl_core::fee::tx_fee;
/// assert_eq!(tx_fee(1, 2, 1, 1), 8);
/// assert_eq!(tx_fee(10, 1, 1, 1), 1);
/// ```
pub fn tx_fee(num_inputs: usize, num_outputs: usize, num_kernels: usize, fee_base: u64) -> u64 {
    let weight = (num_outputs as i64)
        .saturating_mul(4)
        .saturating_add(num_kernels as i64)
        .saturating_sub(num_inputs as i64)
        .max(1) as u64;
    weight.saturating_mul(fee_base)
}

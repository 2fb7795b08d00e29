/// Decimals of the native token (1 tez = 10^6 mutez)
pub const TEZ_DECIMALS: u32 = 6;

/// Format an amount in the smallest unit with `decimals` fractional digits.
pub fn format_token_amount(amount: u64, decimals: u32) -> String {
    let Some(scale) = 10u64.checked_pow(decimals) else {
        // No u64 amount reaches the first significant digit at this scale
        return format!("0.{:0>width$}", amount, width = decimals as usize);
    };
    if decimals == 0 {
        return amount.to_string();
    }
    format!(
        "{}.{:0>width$}",
        amount / scale,
        amount % scale,
        width = decimals as usize
    )
}

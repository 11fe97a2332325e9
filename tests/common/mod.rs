//! Programs shared by the integration tests

#![allow(dead_code)]

/// Sums the divisors of r2 into r0
pub const DIVISOR_SUM: &str = "#ip 4
seti 1 0 1
seti 1 0 5
mulr 1 5 3
eqrr 3 2 3
addr 3 4 4
addi 4 1 4
addr 1 0 0
addi 5 1 5
gtrr 5 2 3
addr 4 3 4
seti 1 0 4
addi 1 1 1
gtrr 1 2 3
addr 3 4 4
seti 0 0 4
mulr 4 4 4";

/// Divisor sum behind a setup block: r2 = (r2 + 2)^2 * 19, plus 10 more
/// when r0 starts at 1
pub const DIVISOR_SUM_WITH_SETUP: &str = "#ip 4
addi 4 16 4
seti 1 0 1
seti 1 0 5
mulr 1 5 3
eqrr 3 2 3
addr 3 4 4
addi 4 1 4
addr 1 0 0
addi 5 1 5
gtrr 5 2 3
addr 4 3 4
seti 2 0 4
addi 1 1 1
gtrr 1 2 3
addr 3 4 4
seti 1 0 4
mulr 4 4 4
addi 2 2 2
mulr 2 2 2
mulr 4 2 2
addr 4 0 4
seti 0 0 4
seti 10 0 3
addr 2 3 2
seti 0 0 0
seti 0 0 4";

/// Counts r0 up to 10 behind a duplicated `r1 = 5`, then adds r1
pub const DUPLICATED_STORE: &str = "#ip 5
seti 5 0 1
seti 5 0 1
addi 0 1 0
gtri 0 9 2
addr 5 2 5
seti 1 0 5
addr 0 1 0";

/// Sum of the divisors of `n`, for checking results
pub fn divisor_sum(n: i64) -> i64 {
    (1..=n).filter(|d| n % d == 0).sum()
}

//! Roulette-wheel helpers.

/// Running sums of the wheel weights of each fitness value.
///
/// Negative and NaN fitness values get no share of the wheel.
///
/// # Examples
/// ```
/// # use evonnet::evolution::cumulative_fitness;
/// let partials = cumulative_fitness([1.0, -3.0, 2.0].iter().copied());
/// assert_eq!(partials, vec![1.0, 1.0, 3.0]);
/// ```
pub fn cumulative_fitness<I: IntoIterator<Item = f64>>(fitness: I) -> Vec<f64> {
    fitness
        .into_iter()
        .scan(0.0, |sum, f| {
            if f > 0.0 {
                *sum += f;
            }
            Some(*sum)
        })
        .collect()
}

/// Index of the first partial sum that is not below `draw`.
///
/// A draw beyond every partial sum (a rounding artefact) selects the last index.
pub fn roulette_index(partials: &[f64], draw: f64) -> usize {
    match partials.iter().position(|&p| draw <= p) {
        Some(index) => index,
        None => {
            log::warn!(
                "Selection draw {} exceeds total fitness {:?}, using last individual",
                draw,
                partials.last()
            );
            partials.len().saturating_sub(1)
        }
    }
}

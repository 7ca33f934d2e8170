//! Small numeric helpers shared by the analytics reports.

/// Running aggregate over a group of traffic rows.
#[derive(Debug, Clone, Default)]
pub struct GroupAccumulator {
    pub count: usize,
    vehicles_sum: f64,
    speed_sum: f64,
    pub max_vehicles: u32,
    pub min_vehicles: u32,
}

impl GroupAccumulator {
    pub fn push(&mut self, vehicles: u32, speed: f64) {
        if self.count == 0 {
            self.max_vehicles = vehicles;
            self.min_vehicles = vehicles;
        } else {
            self.max_vehicles = self.max_vehicles.max(vehicles);
            self.min_vehicles = self.min_vehicles.min(vehicles);
        }
        self.count += 1;
        self.vehicles_sum += f64::from(vehicles);
        self.speed_sum += speed;
    }

    /// Mean vehicle count, 0.0 for an empty group.
    pub fn avg_vehicles(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.vehicles_sum / self.count as f64
        }
    }

    pub fn avg_speed(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.speed_sum / self.count as f64
        }
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n − 1). Zero for fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    let Some(m) = mean(values) else { return 0.0 };
    if values.len() < 2 {
        return 0.0;
    }
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Pearson correlation coefficient.
///
/// `None` when the series differ in length, have fewer than two points,
/// or either series is constant.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;
    let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some((cov / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator() {
        let mut acc = GroupAccumulator::default();
        assert_eq!(acc.avg_vehicles(), 0.0);
        for (v, s) in [(150, 30.0), (170, 20.0), (160, 25.0)] {
            acc.push(v, s);
        }
        assert_eq!(acc.count, 3);
        assert_eq!(acc.avg_vehicles(), 160.0);
        assert_eq!(acc.avg_speed(), 25.0);
        assert_eq!(acc.max_vehicles, 170);
        assert_eq!(acc.min_vehicles, 150);
    }

    #[test]
    fn test_sample_std_dev() {
        assert_eq!(sample_std_dev(&[]), 0.0);
        assert_eq!(sample_std_dev(&[5.0]), 0.0);
        // 150, 170, 160: variance 100 with n − 1.
        assert!((sample_std_dev(&[150.0, 170.0, 160.0]) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_perfect_and_inverse() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let up = [10.0, 20.0, 30.0, 40.0];
        let down = [40.0, 30.0, 20.0, 10.0];
        assert!((pearson(&xs, &up).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&xs, &down).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pearson_undefined_cases() {
        assert!(pearson(&[1.0], &[2.0]).is_none());
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
        assert!(pearson(&[1.0, 2.0], &[1.0]).is_none());
    }
}

use std::collections::VecDeque;

use kornia_3d::transforms::{angular_distance, EuclideanTransform};

use crate::IcpError;

/// A stateful convergence test, polled once per registration iteration.
pub trait TransformationChecker {
    /// Whether the registration should run another iteration, given the accumulated transform.
    fn should_continue(&mut self, transform: &EuclideanTransform) -> Result<bool, IcpError>;
}

/// Creates a fresh [`TransformationChecker`] for every registration run.
pub trait TransformationCheckerFactory {
    /// Create a checker with no history.
    fn create_transformation_checker(&self) -> Box<dyn TransformationChecker>;
}

/// Convergence criteria of the default transformation checker.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ICPConvergenceCriteria {
    /// Maximum number of iterations allowed by the counter checker.
    pub max_iterations: usize,
    /// Number of trailing transforms over which the differences are averaged.
    pub smooth_length: usize,
    /// Rotation difference below which the registration is considered converged, in radians.
    pub min_diff_rot_err: f64,
    /// Translation difference below which the registration is considered converged.
    pub min_diff_trans_err: f64,
}

impl Default for ICPConvergenceCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            smooth_length: 3,
            min_diff_rot_err: 0.001,
            min_diff_trans_err: 1.0,
        }
    }
}

/// Stops after a fixed number of iterations.
#[derive(Debug, Clone)]
pub struct CounterTransformationChecker {
    iteration_count: usize,
    max_iteration_count: usize,
}

impl CounterTransformationChecker {
    /// Create a checker allowing `max_iteration_count` iterations.
    pub fn new(max_iteration_count: usize) -> Self {
        Self {
            iteration_count: 0,
            max_iteration_count,
        }
    }
}

impl TransformationChecker for CounterTransformationChecker {
    fn should_continue(&mut self, _transform: &EuclideanTransform) -> Result<bool, IcpError> {
        self.iteration_count += 1;
        Ok(self.iteration_count <= self.max_iteration_count)
    }
}

/// Stops once the transform barely changes over the last `smooth_length` iterations.
///
/// The rotation and translation differences between consecutive transforms are
/// summed over the window, then averaged and compared with the thresholds. A
/// not-a-number difference is a fatal error.
#[derive(Debug, Clone)]
pub struct DifferentialTransformationChecker {
    transforms: VecDeque<EuclideanTransform>,
    smooth_length: usize,
    min_diff_rot_err: f64,
    min_diff_trans_err: f64,
}

impl DifferentialTransformationChecker {
    /// Create a checker averaging over `smooth_length` iterations.
    pub fn new(smooth_length: usize, min_diff_rot_err: f64, min_diff_trans_err: f64) -> Self {
        Self {
            transforms: VecDeque::with_capacity(smooth_length + 1),
            smooth_length,
            min_diff_rot_err,
            min_diff_trans_err,
        }
    }
}

impl Default for DifferentialTransformationChecker {
    fn default() -> Self {
        let criteria = ICPConvergenceCriteria::default();
        Self::new(
            criteria.smooth_length,
            criteria.min_diff_rot_err,
            criteria.min_diff_trans_err,
        )
    }
}

impl TransformationChecker for DifferentialTransformationChecker {
    fn should_continue(&mut self, transform: &EuclideanTransform) -> Result<bool, IcpError> {
        self.transforms.push_back(*transform);

        let mut rot_err = 0.0;
        let mut trans_err = 0.0;

        if self.transforms.len() > self.smooth_length {
            // only the window and the transform before it are ever read
            while self.transforms.len() > self.smooth_length + 1 {
                self.transforms.pop_front();
            }

            for (prev, curr) in self.transforms.iter().zip(self.transforms.iter().skip(1)) {
                rot_err += angular_distance(&curr.rotation, &prev.rotation).abs();
                trans_err += (curr.translation - prev.translation).length();
            }

            let n = self.smooth_length as f64;
            if rot_err / n < self.min_diff_rot_err && trans_err / n < self.min_diff_trans_err {
                return Ok(false);
            }
        }

        if rot_err.is_nan() {
            return Err(IcpError::NotANumber("abs rotation norm"));
        }
        if trans_err.is_nan() {
            return Err(IcpError::NotANumber("abs translation norm"));
        }

        Ok(true)
    }
}

/// Continues only while every checker votes to continue.
///
/// Every checker is polled on each call so that all of them see every transform.
pub struct CompositeTransformationChecker {
    checkers: Vec<Box<dyn TransformationChecker>>,
}

impl CompositeTransformationChecker {
    /// Combine `checkers` with a logical and.
    pub fn new(checkers: Vec<Box<dyn TransformationChecker>>) -> Self {
        Self { checkers }
    }
}

impl TransformationChecker for CompositeTransformationChecker {
    fn should_continue(&mut self, transform: &EuclideanTransform) -> Result<bool, IcpError> {
        let mut keep_going = true;
        for checker in self.checkers.iter_mut() {
            keep_going &= checker.should_continue(transform)?;
        }
        Ok(keep_going)
    }
}

/// Creates a counter and a differential checker combined with a logical and.
#[derive(Debug, Clone, Default)]
pub struct DefaultTransformationCheckerFactory {
    /// Criteria of the created checkers.
    pub criteria: ICPConvergenceCriteria,
}

impl DefaultTransformationCheckerFactory {
    /// Create a factory with the given criteria.
    pub fn new(criteria: ICPConvergenceCriteria) -> Self {
        Self { criteria }
    }
}

impl TransformationCheckerFactory for DefaultTransformationCheckerFactory {
    fn create_transformation_checker(&self) -> Box<dyn TransformationChecker> {
        let criteria = &self.criteria;
        Box::new(CompositeTransformationChecker::new(vec![
            Box::new(CounterTransformationChecker::new(criteria.max_iterations)),
            Box::new(DifferentialTransformationChecker::new(
                criteria.smooth_length,
                criteria.min_diff_rot_err,
                criteria.min_diff_trans_err,
            )),
        ]))
    }
}

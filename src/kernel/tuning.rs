use std::collections::BTreeMap;

use serde::Serialize;

/// One tunable knob of a kernel template.
#[derive(Debug, Clone, Serialize)]
pub struct TuningArg {
    pub name: &'static str,
    pub values: Vec<String>,
    pub description: &'static str,
    /// Position in the iteration order; the highest order varies fastest.
    pub order: u32,
}

impl TuningArg {
    pub fn new<T: ToString>(
        name: &'static str,
        values: impl IntoIterator<Item = T>,
        description: &'static str,
        order: u32,
    ) -> Self {
        Self {
            name,
            values: values.into_iter().map(|v| v.to_string()).collect(),
            description,
            order,
        }
    }
}

/// A single point of a [`TuningSpace`], keyed by argument name.
pub type Configuration = BTreeMap<&'static str, String>;

#[derive(Debug, Clone, Default)]
pub struct TuningSpace {
    args: Vec<TuningArg>,
}

impl TuningSpace {
    pub fn new(mut args: Vec<TuningArg>) -> Self {
        args.sort_by_key(|arg| arg.order);
        Self { args }
    }

    pub fn args(&self) -> &[TuningArg] {
        &self.args
    }

    pub fn len(&self) -> usize {
        if self.args.is_empty() {
            return 0;
        }
        self.args.iter().map(|arg| arg.values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination of argument values.
    pub fn configurations(&self) -> Vec<Configuration> {
        let mut configurations = Vec::with_capacity(self.len());
        if self.is_empty() {
            return configurations;
        }

        // Odometer over the value indices, last argument spinning fastest.
        let mut indices = vec![0usize; self.args.len()];
        loop {
            configurations.push(
                self.args
                    .iter()
                    .zip(&indices)
                    .map(|(arg, &i)| (arg.name, arg.values[i].clone()))
                    .collect(),
            );

            let mut position = self.args.len();
            loop {
                if position == 0 {
                    return configurations;
                }
                position -= 1;
                indices[position] += 1;
                if indices[position] < self.args[position].values.len() {
                    break;
                }
                indices[position] = 0;
            }
        }
    }
}

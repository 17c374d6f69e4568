/// One categorical label per sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLabels {
    labels: Vec<String>,
}

impl GroupLabels {
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Self {
        GroupLabels {
            labels: labels.iter().map(|l| l.as_ref().to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }

    /// Sorted distinct categories
    pub fn levels(&self) -> Vec<&str> {
        extract_unique_groups(&self.labels)
    }

    /// Sample positions carrying `level`
    pub fn indices_of(&self, level: &str) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter_map(|(i, l)| if l == level { Some(i) } else { None })
            .collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for GroupLabels {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        GroupLabels {
            labels: iter.into_iter().map(|l| l.as_ref().to_string()).collect(),
        }
    }
}

pub fn extract_unique_groups(labels: &[String]) -> Vec<&str> {
    let mut unique_groups: Vec<&str> = labels.iter().map(String::as_str).collect();
    unique_groups.sort_unstable();
    unique_groups.dedup();
    unique_groups
}

/// Get indices for the reference and effect groups
pub fn get_group_indices(
    labels: &GroupLabels,
    reference: &str,
    effect: &str,
) -> (Vec<usize>, Vec<usize>) {
    (labels.indices_of(reference), labels.indices_of(effect))
}

/// Default identifiers for genes without caller-provided names.
pub fn default_gene_ids(n_genes: usize) -> Vec<String> {
    (0..n_genes).map(|i| format!("gene_{}", i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_sorted_and_unique() {
        let labels = GroupLabels::new(&["normal", "cancer", "normal", "cancer", "cancer"]);
        assert_eq!(labels.levels(), vec!["cancer", "normal"]);
        assert_eq!(labels.len(), 5);
    }

    #[test]
    fn test_group_indices() {
        let labels: GroupLabels = ["a", "b", "a", "b", "b"].into_iter().collect();
        let (reference, effect) = get_group_indices(&labels, "a", "b");
        assert_eq!(reference, vec![0, 2]);
        assert_eq!(effect, vec![1, 3, 4]);
    }
}

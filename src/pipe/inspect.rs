/// Passes the item through while performing a side effect, such as tracing it.
pub fn inspect<T: Copy>(mut f: impl FnMut(&T)) -> impl FnMut(&T) -> Option<T> {
    move |item: &T| {
        f(item);
        Some(*item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Reading;
    use crate::stage::Stage;

    #[test]
    fn test_inspect_sees_every_reading() {
        let mut seen = Vec::new();
        let mut out = Vec::new();
        {
            let mut pipe = inspect(|r: &Reading| seen.push(r.temperature));
            for t in [225.0, 226.5] {
                pipe.process(&Reading::untimed(t), &mut |r: Reading| out.push(r));
            }
        }

        assert_eq!(seen, vec![225.0, 226.5]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].temperature, 226.5);
    }
}

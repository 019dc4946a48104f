use std::sync::Arc;

use crate::error::RoutingError;

use super::route::Route;
use super::rule::check_path;

/// 全グループを対象とするグループキー
pub const WILDCARD: &str = "*";

struct Group<H> {
    key: Box<str>,
    routes: Vec<Arc<Route<H>>>,
}

/// Group-partitioned route registry with first-match-wins lookup.
///
/// Groups are usually HTTP method names; [`WILDCARD`] spans every group.
/// Groups and the routes inside them keep their insertion order.
///
/// グループ単位のルート登録簿。グループ数は少ないので線形探索で十分。
pub struct RouteMap<H> {
    groups: Vec<Group<H>>,
}

impl<H> Default for RouteMap<H> {
    fn default() -> Self {
        RouteMap::new()
    }
}

impl<H> RouteMap<H> {
    pub fn new() -> RouteMap<H> {
        RouteMap {
            groups: vec![Group {
                key: WILDCARD.into(),
                routes: Vec::new(),
            }],
        }
    }

    #[inline]
    fn group(&self, key: &str) -> Option<&Group<H>> {
        self.groups.iter().find(|g| &*g.key == key)
    }

    /// Registers `route` under every group in `groups`.
    ///
    /// Adding the same route (by reference) to a group twice is a no-op.
    /// Unknown groups are created on first use.
    pub fn add<I, S>(&mut self, route: Arc<Route<H>>, groups: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for key in groups {
            let key = key.as_ref();
            let idx = match self.groups.iter().position(|g| &*g.key == key) {
                Some(idx) => idx,
                None => {
                    self.groups.push(Group {
                        key: key.into(),
                        routes: Vec::new(),
                    });
                    self.groups.len() - 1
                }
            };
            let routes = &mut self.groups[idx].routes;
            if !routes.iter().any(|r| Arc::ptr_eq(r, &route)) {
                routes.push(Arc::clone(&route));
            }
        }
        self
    }

    /// Unregisters `route`.
    ///
    /// Removing from [`WILDCARD`] drops the route from every group and stops
    /// processing the remaining keys. Removing from a named group where the
    /// route is not registered is a no-op.
    pub fn remove<I, S>(&mut self, route: &Arc<Route<H>>, groups: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for key in groups {
            let key = key.as_ref();
            if key == WILDCARD {
                for group in self.groups.iter_mut() {
                    group.routes.retain(|r| !Arc::ptr_eq(r, route));
                }
                return self;
            }
            if let Some(group) = self.groups.iter_mut().find(|g| &*g.key == key) {
                group.routes.retain(|r| !Arc::ptr_eq(r, route));
            }
        }
        self
    }

    /// 登録済みのグループキー（登録順）
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| &*g.key)
    }

    pub fn routes(&self, group: &str) -> &[Arc<Route<H>>] {
        self.group(group).map(|g| g.routes.as_slice()).unwrap_or(&[])
    }

    /// 全グループを通した重複なしのルート数
    pub fn len(&self) -> usize {
        let mut seen: Vec<&Arc<Route<H>>> = Vec::new();
        for route in self.groups.iter().flat_map(|g| g.routes.iter()) {
            if !seen.iter().any(|r| Arc::ptr_eq(r, route)) {
                seen.push(route);
            }
        }
        seen.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.routes.is_empty())
    }
}

impl<H: Clone> RouteMap<H> {
    /// Finds the first route matching `path` within `groups`.
    ///
    /// * [`WILDCARD`]: every group is scanned (group order, then route order)
    ///   and the remaining requested keys are ignored.
    /// * named groups: scanned in the order given; a key absent from the
    ///   registry ends the lookup with `Ok(None)` without trying later keys.
    ///
    /// A hit returns a request-scoped clone of the route carrying the
    /// bindings; the registry itself is never mutated.
    pub fn find<I, S>(&self, path: &str, groups: I) -> Result<Option<Route<H>>, RoutingError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        check_path(path)?;
        for key in groups {
            let key = key.as_ref();
            if key == WILDCARD {
                for group in &self.groups {
                    if let Some(found) = Self::scan(&group.routes, path)? {
                        return Ok(Some(found));
                    }
                }
                break;
            }

            let Some(group) = self.group(key) else {
                return Ok(None);
            };
            if let Some(found) = Self::scan(&group.routes, path)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    #[inline]
    fn scan(routes: &[Arc<Route<H>>], path: &str) -> Result<Option<Route<H>>, RoutingError> {
        for route in routes {
            if let Some(params) = route.rule().matches(path)? {
                return Ok(Some(route.bound(params)));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PathError;

    fn route(pattern: &str) -> Arc<Route<&'static str>> {
        Arc::new(Route::new(pattern, "listener"))
    }

    #[test]
    fn idempotent_add() {
        let mut map = RouteMap::new();
        let r1 = route("/a");
        map.add(Arc::clone(&r1), [WILDCARD])
            .add(Arc::clone(&r1), [WILDCARD])
            .add(Arc::clone(&r1), ["GET", "GET"]);

        assert_eq!(map.routes(WILDCARD).len(), 1);
        assert_eq!(map.routes("GET").len(), 1);
        assert_eq!(map.len(), 1);
        assert_eq!(map.groups().collect::<Vec<_>>(), [WILDCARD, "GET"]);
    }

    #[test]
    fn same_pattern_different_reference_is_kept() {
        let mut map = RouteMap::new();
        map.add(route("/a"), ["GET"]).add(route("/a"), ["GET"]);
        assert_eq!(map.routes("GET").len(), 2);
    }

    #[test]
    fn first_match_wins() {
        let mut map = RouteMap::new();
        let first = Arc::new(Route::new("/{any}", "first"));
        let second = Arc::new(Route::new("/fixed", "second"));
        map.add(first, ["GET"]).add(second, ["GET"]);

        let found = map.find("/fixed", ["GET"]).unwrap().unwrap();
        assert_eq!(*found.callback(), "first");
        assert_eq!(found.param("any"), Some("fixed"));
    }

    #[test]
    fn wildcard_scans_every_group() {
        let mut map = RouteMap::new();
        map.add(route("/get"), ["GET"]).add(route("/post"), ["POST"]);

        assert!(map.find("/get", [WILDCARD]).unwrap().is_some());
        assert!(map.find("/post", [WILDCARD]).unwrap().is_some());
    }

    #[test]
    fn wildcard_ignores_later_keys() {
        let mut map = RouteMap::new();
        map.add(route("/post"), ["POST"]);
        // "*" の走査後は残りのキーを見ない。ただし "*" 自体が全グループを見る
        assert!(map.find("/post", [WILDCARD, "GET"]).unwrap().is_some());
        assert!(map.find("/missing", [WILDCARD, "POST"]).unwrap().is_none());
    }

    #[test]
    fn missing_named_group_stops_lookup() {
        let mut map = RouteMap::new();
        map.add(route("/post"), ["POST"]);

        assert!(map.find("/post", ["POST"]).unwrap().is_some());
        assert!(map.find("/post", ["GET", "POST"]).unwrap().is_none());

        map.add(route("/other"), ["GET"]);
        assert!(map.find("/post", ["GET", "POST"]).unwrap().is_some());
    }

    #[test]
    fn remove_from_named_group() {
        let mut map = RouteMap::new();
        let r = route("/a");
        map.add(Arc::clone(&r), ["GET", "POST"]);
        map.remove(&r, ["GET"]);

        assert!(map.find("/a", ["GET"]).unwrap().is_none());
        assert!(map.find("/a", ["POST"]).unwrap().is_some());

        // 未登録のグループからの削除は何もしない
        map.remove(&r, ["GET"]).remove(&r, ["PUT"]);
        assert!(map.find("/a", ["POST"]).unwrap().is_some());
    }

    #[test]
    fn remove_via_wildcard_clears_every_group() {
        let mut map = RouteMap::new();
        let r = route("/a");
        let keep = route("/b");
        map.add(Arc::clone(&r), ["GET", "POST"])
            .add(Arc::clone(&r), [WILDCARD])
            .add(Arc::clone(&keep), ["GET"]);
        map.remove(&r, [WILDCARD]);

        for group in [WILDCARD, "GET", "POST"] {
            assert!(map.find("/a", [group]).unwrap().is_none(), "{}", group);
        }
        assert!(map.find("/b", ["GET"]).unwrap().is_some());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn find_propagates_path_errors() {
        let mut map = RouteMap::new();
        map.add(route("/a"), ["GET"]);
        assert_eq!(
            map.find("a", ["GET"]).unwrap_err(),
            RoutingError::Path(PathError::MissingLeadingSlash("a".to_string()))
        );
        // 該当グループが無くても前提条件は検査される
        assert!(matches!(
            map.find("/a/", ["PUT"]),
            Err(RoutingError::Path(PathError::TrailingSlash(_)))
        ));
    }

    #[test]
    fn find_returns_isolated_clones() {
        let mut map = RouteMap::new();
        map.add(route("/sample/{pattern}"), ["GET"]);

        let a = map.find("/sample/one", ["GET"]).unwrap().unwrap();
        let b = map.find("/sample/two", ["GET"]).unwrap().unwrap();
        assert_eq!(a.param("pattern"), Some("one"));
        assert_eq!(b.param("pattern"), Some("two"));
        assert!(map.routes("GET")[0].params().is_empty());
    }

    #[test]
    fn empty_map() {
        let map: RouteMap<()> = RouteMap::new();
        assert!(map.is_empty());
        assert!(map.find("/", [WILDCARD]).unwrap().is_none());
        assert!(map.routes("GET").is_empty());
    }
}

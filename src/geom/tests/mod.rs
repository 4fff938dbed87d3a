mod test_spatial_sort_basic;
